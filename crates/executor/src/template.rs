// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::path::Path;

/// Substitute `$binary`, `$file`, `$timeout` and `$memory` in a command
/// template. The result is executed through a shell, so templates can
/// compose pipes and redirections.
pub fn substitute(cmd: &str, binary: &str, file: &Path, timeout_s: u64, memory_mb: u64) -> String {
	cmd.replace("$binary", binary)
		.replace("$file", &file.display().to_string())
		.replace("$timeout", &timeout_s.to_string())
		.replace("$memory", &memory_mb.to_string())
}
