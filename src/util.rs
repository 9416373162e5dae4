// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::path::Path;

/// Returns the name a sample loaded from `path` is known by: its file name, with any invalid
/// UTF-8 replaced.
pub fn sample_name(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}

/// Formats a length in milliseconds as minutes:seconds.millis, e.g. `1:05.250`.
pub fn format_ms(ms: f64) -> String {
    let total = if ms.is_finite() && ms > 0.0 {
        ms.round() as u64
    } else {
        0
    };
    let minutes = total / 60_000;
    let seconds = total / 1000 % 60;
    format!("{}:{:02}.{:03}", minutes, seconds, total % 1000)
}
