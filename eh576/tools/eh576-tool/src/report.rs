use std::path::Path;

use console::{style, Color};

use egis_probe::analysis::{Analysis, Header, Likelihood};
use egis_probe::frame::hex_preview;
use egis_probe::sequence::{SequenceReport, StepRecord};
use egis_probe::{Classification, Outcome, Tier};

const PREVIEW_BYTES: usize = 20;

fn tier_color(tier: Tier) -> Color {
    match tier {
        Tier::Empty     => Color::Red,
        Tier::Poor      => Color::Red,
        Tier::Fair      => Color::Yellow,
        Tier::Good      => Color::Green,
        Tier::Excellent => Color::Cyan,
    }
}

pub fn classification(c: &Classification) -> String {
    format!("{} ({:.1}% non-zero, {} distinct values)",
        style(c.tier).fg(tier_color(c.tier)).bold(),
        c.non_zero_ratio * 100.0,
        c.distinct_value_count,
    )
}

pub fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Received(response) => {
            let magic = if response.has_response_magic() { " SIGE" } else { "" };
            let partial = if response.is_partial() {
                format!(" [{}/{}]", response.len(), response.requested())
            } else {
                String::new()
            };
            println!("\t<- {}{}{}", hex_preview(response.data(), PREVIEW_BYTES), style(magic).green(), partial);
        },
        Outcome::TimedOut => {
            println!("\t<- {}", style("timeout").dim());
        },
    }
}

pub fn print_step(record: &StepRecord) {
    println!("{:2}.{:02} {}", record.cycle, record.index, style(&record.name).bold());
    print_outcome(&record.outcome);

    if let Some(c) = &record.classification {
        println!("\tquality: {}", classification(c));
    }
    if let Some(path) = &record.saved {
        println!("\tsaved: {}", path.display());
    }
}

pub fn print_summary(report: &SequenceReport) {
    let captures = report.steps.iter().filter(|s| s.classification.is_some()).count();
    print!("{}: {} cycle(s), {} step(s), {} timeout(s), {}/{} good capture(s)",
        style(&report.name).bold(),
        report.cycles,
        report.steps.len(),
        report.timeouts(),
        report.successful_captures(),
        captures,
    );
    if report.aborted {
        print!(" {}", style("(stopped)").yellow());
    }
    println!();

    if let Some(best) = report.best() {
        if let Some(c) = &best.classification {
            println!("\tbest: {} cycle {}: {}", best.name, best.cycle, classification(c));
        }
    }
}

///////////////////////////////////////////////////////////////////////

pub fn print_analysis(path: &Path, a: &Analysis) {
    println!("{}", style(path.display()).bold());
    println!("\tsize: {} bytes", a.size);
    if a.size == 0 {
        println!("\t{}", style("empty file").red());
        return;
    }

    println!("\tfirst 32 bytes: {}", a.preview);
    match a.header {
        Some(Header::Request)  => println!("\theader: EGIS"),
        Some(Header::Response) => println!("\theader: SIGE"),
        None => {},
    }

    let likelihood = match a.likelihood {
        Likelihood::High   => style("HIGH: image data").green(),
        Likelihood::Medium => style("MEDIUM: sensor data").yellow(),
        Likelihood::Low    => style("LOW: mostly zeros or status").red(),
    };
    println!("\tlikelihood: {likelihood}");
    println!("\tquality: {}", classification(&a.classification));
    println!("\tentropy: {:.2} bits/byte, mean {:.1}, variance {:.1}, score {:.1}",
        a.entropy, a.mean, a.variance, a.quality_score);

    if a.has_long_run() {
        println!("\t{} {} bytes", style("long run of one value:").yellow(), a.longest_run);
    }

    if a.is_eh575_image() {
        println!("\t{}", style("exact EH575 image size: 103x52").green());
    } else if !a.dimensions.is_empty() {
        let dims: Vec<String> = a.dimensions.iter().map(|(w, h)| format!("{w}x{h}")).collect();
        println!("\tpossible dimensions: {}", dims.join(", "));
    }
}

pub fn print_analysis_summary(results: &[(&Path, Analysis)]) {
    let mut large: Vec<&(&Path, Analysis)> = results.iter().filter(|(_, a)| a.size > 1000).collect();
    large.sort_by(|a, b| b.1.size.cmp(&a.1.size));

    if !large.is_empty() {
        println!("{}", style("Largest files").bold());
        for (path, a) in large.iter().take(3) {
            println!("\t{}: {} bytes, {} non-zero", path.display(), a.size, a.non_zero);
        }
    }

    let dense: Vec<&(&Path, Analysis)> = results.iter()
        .filter(|(_, a)| a.classification.non_zero_ratio > 0.5)
        .collect();
    if !dense.is_empty() {
        println!("{}", style("Files with significant data").bold());
        for (path, a) in dense {
            println!("\t{}: {} bytes, {:.1}% non-zero", path.display(), a.size, a.classification.non_zero_ratio * 100.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egis_probe::classify;

    #[test]
    fn classification_reports_distinct_values_not_entropy() {
        let line = classification(&classify(&[0, 1, 2, 3]));
        assert!(line.contains("75.0% non-zero"), "{line}");
        assert!(line.contains("4 distinct values"), "{line}");
        assert!(!line.contains("entropy"), "{line}");
    }
}
