// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use corral_client::Status;
use corral_core::{Event, unix_now};
use corral_runner::{Agreement, Summary, agreement};

pub fn print_run_header(task: &str, provers: usize, problems: usize, parallelism: usize) {
	println!("task {task}: {provers} prover(s) x {problems} problem(s), {parallelism} at a time");
	println!();
}

pub fn print_event(done: usize, total: usize, event: &Event) {
	let verdict = match agreement(event) {
		Agreement::Ok => "ok",
		Agreement::Inconclusive => "??",
		Agreement::Mismatch => "FAIL",
	};
	println!(
		"[{done}/{total}] {verdict:>4}  {:<12} {:<40} {:<8} {:.2}s",
		event.program.name,
		event.problem.path.display(),
		event.res.to_string(),
		event.raw.rtime,
	);
}

pub fn print_summary(snapshot: &corral_core::Snapshot, summary: &Summary) {
	println!();
	println!("snapshot {} ({} events)", snapshot.uuid, snapshot.events.len());
	println!(
		"ok {}, inconclusive {}, mismatching {}, discarded {}",
		summary.ok, summary.inconclusive, summary.mismatch, summary.discarded
	);
	if summary.mismatch > 0 {
		println!();
		for event in &snapshot.events {
			if agreement(event) == Agreement::Mismatch {
				println!(
					"  {} on {}: got {}, expected {}",
					event.program.name,
					event.problem.path.display(),
					event.res,
					event.problem.expect,
				);
			}
		}
	}
}

pub fn print_status(status: &Status) {
	let used: u32 = status.running.iter().map(|j| j.job.cores_of(status.max_cores)).sum();
	println!("cores: {used}/{} used", status.max_cores);

	if !status.running.is_empty() {
		println!("running:");
		for job in &status.running {
			println!(
				"  [{}] pid {} cores {} priority {} {:>7.1}s  {}",
				job.id,
				job.job.pid,
				job.job.cores,
				job.job.priority,
				unix_now() - job.start_time,
				job.job.info.as_deref().unwrap_or("-"),
			);
		}
	}
	if !status.waiting.is_empty() {
		println!("waiting:");
		for job in &status.waiting {
			println!(
				"  [{}] pid {} cores {} priority {}  {}",
				job.id,
				job.job.pid,
				job.job.cores,
				job.job.priority,
				job.job.info.as_deref().unwrap_or("-"),
			);
		}
	}
	if status.running.is_empty() && status.waiting.is_empty() {
		println!("idle");
	}
}
