use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use proxyshift_upgrade::{Phase, Progress, UpgradeEvent, UpgradeReport};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty()),
    )
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = format!("[{}]", status.to_ascii_uppercase());
            let badge = match status_style(status) {
                Some(style) => colorize(style, &badge),
                None => badge,
            };
            format!("{badge} {message}")
        }
    }
}

pub(crate) fn render_error_line(style: OutputStyle, err: &anyhow::Error) -> String {
    match style {
        OutputStyle::Plain => format!("error: {err:#}"),
        OutputStyle::Rich => render_status_line(style, "error", &format!("{err:#}")),
    }
}

fn render_section_header(style: OutputStyle, title: &str) -> String {
    match style {
        OutputStyle::Plain => format!("{title}:"),
        OutputStyle::Rich => colorize(section_style(), &format!("== {title} ==")),
    }
}

/// Lines printed after a run: per-unit status first, then the instructions an
/// operator has to submit through the multisig, then `Done`.
pub(crate) fn format_report_lines(report: &UpgradeReport, style: OutputStyle) -> Vec<String> {
    let mut lines = report
        .events()
        .iter()
        .filter(|event| !event.is_multisig_instruction())
        .map(|event| render_status_line(style, event_status(event), &event.to_string()))
        .collect::<Vec<_>>();

    let instructions = report.multisig_instructions();
    if !instructions.is_empty() {
        lines.push(render_section_header(style, "Instructions for multisig"));
        for (index, instruction) in instructions.iter().enumerate() {
            lines.push(format!("{}. {instruction}", index + 1));
        }
    }

    lines.push(render_status_line(style, "ok", "Done"));
    lines
}

fn event_status(event: &UpgradeEvent) -> &'static str {
    if event.is_warning() {
        return "warn";
    }
    match event {
        UpgradeEvent::UpToDate { .. } | UpgradeEvent::VerificationSkipped { .. } => "skip",
        UpgradeEvent::UpgradePending { .. } => "plan",
        _ => "ok",
    }
}

fn status_style(status: &str) -> Option<Style> {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "error" => AnsiColor::BrightRed,
        "plan" => AnsiColor::BrightCyan,
        _ => return None,
    };
    Some(Style::new().fg_color(Some(color.into())).effects(Effects::BOLD))
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Progress bar over the units of a phase; silent in plain mode.
pub(crate) struct TerminalProgress {
    style: OutputStyle,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl TerminalProgress {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self {
            style,
            progress_bar: None,
            started_at: Instant::now(),
        }
    }

    fn bar_for(&mut self, phase: Phase, total: usize) -> Option<&ProgressBar> {
        if self.style == OutputStyle::Plain {
            return None;
        }
        if self.progress_bar.is_none() {
            let progress_bar = ProgressBar::new(total.max(1) as u64);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {prefix:<10} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {msg}",
            ) {
                progress_bar.set_style(style.progress_chars("=>-"));
            }
            progress_bar.set_prefix(phase.as_str());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            self.started_at = Instant::now();
            self.progress_bar = Some(progress_bar);
        }
        self.progress_bar.as_ref()
    }
}

impl Progress for TerminalProgress {
    fn unit_started(&mut self, phase: Phase, index: usize, total: usize, unit: &str) {
        if let Some(progress_bar) = self.bar_for(phase, total) {
            progress_bar.set_position(index as u64);
            progress_bar.set_message(unit.to_string());
        }
    }

    fn phase_finished(&mut self, phase: Phase) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };
        progress_bar.finish_and_clear();
        let elapsed = self.started_at.elapsed();
        println!(
            "{}",
            render_status_line(
                self.style,
                "ok",
                &format!(
                    "{} finished in {}.{:03}s",
                    phase.as_str(),
                    elapsed.as_secs(),
                    elapsed.subsec_millis()
                ),
            )
        );
    }
}
