use console::Style;
use voltrace_core::{CellResult, ExtractionConfig};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    good: Style,
    bad: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            good: Style::new().green().bold(),
            bad: Style::new().yellow().bold(),
        }
    }

    fn flag(&self, ok: bool, yes: &'static str, no: &'static str) -> console::StyledObject<&'static str> {
        if ok {
            self.good.apply_to(yes)
        } else {
            self.bad.apply_to(no)
        }
    }
}

fn print_title(s: &Styles, title: &str) {
    println!();
    println!("  {}", s.title.apply_to(title));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(title.chars().count())));
    println!();
}

pub fn print_config_summary(config: &ExtractionConfig) {
    let s = Styles::new();
    print_title(&s, "Extraction Config");

    println!("  {}", s.header.apply_to("Context"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Window"),
        s.value.apply_to(format!("{} px", config.context_size))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Censor"),
        s.value.apply_to(format!("{} px", config.censor_size))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Flip"),
        s.value.apply_to(config.flip_signal)
    );
    println!();

    println!("  {}", s.header.apply_to("Background"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Bleach HP"),
        s.value.apply_to(format!("{:.3} Hz", config.hp_freq_pb))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Components"),
        s.value.apply_to(config.n_pc_bg)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Ridge"),
        s.value.apply_to(config.ridge_bg)
    );
    println!();

    println!("  {}", s.header.apply_to("Spikes"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Threshold"),
        s.method.apply_to(config.threshold_method)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Trace HP"),
        s.value.apply_to(format!("{:.2} Hz", config.hp_freq))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Min / clip"),
        s.value.apply_to(format!("{} / {}", config.min_spikes, config.clip))
    );
    println!();

    println!("  {}", s.header.apply_to("Spatial"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Update"),
        s.method.apply_to(config.weight_update)
    );
    println!("    {:<14}{:?}", s.label.apply_to("Sigmas"), config.sigmas);
    println!(
        "    {:<14}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.n_iter)
    );
    println!();
}

/// Print one cell's result, scored against the injected spike times.
pub fn print_cell_summary(result: &CellResult, truth: &[usize]) {
    let s = Styles::new();
    print_title(&s, &format!("Cell {}", result.cell_id));

    let ctx = result.context;
    println!(
        "  {:<14}{}",
        s.label.apply_to("Context"),
        s.value.apply_to(format!(
            "rows {}..={}, cols {}..={}",
            ctx.row_start, ctx.row_end, ctx.col_start, ctx.col_end
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Spikes"),
        s.value.apply_to(
            result
                .num_spikes
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" \u{2192} ")
        )
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("SNR"),
        s.value.apply_to(format!("{:.2}", result.snr))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Locality"),
        s.flag(result.locality, "inside ROI", "outside ROI")
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Spike count"),
        s.flag(!result.low_spikes, "ok", "low")
    );
    if let (Some(fpr), Some(dr)) = (result.false_positive_rate, result.detection_rate) {
        println!(
            "  {:<14}{}",
            s.label.apply_to("FP / detect"),
            s.value.apply_to(format!("{:.3} / {:.3}", fpr, dr))
        );
    }

    let hits = truth
        .iter()
        .filter(|&&t| result.spikes.iter().any(|&f| f.abs_diff(t) <= 1))
        .count();
    let recall = if truth.is_empty() {
        1.0
    } else {
        hits as f64 / truth.len() as f64
    };
    let recall_style = if recall >= 0.9 { &s.good } else { &s.bad };
    println!(
        "  {:<14}{}",
        s.label.apply_to("Recall"),
        recall_style.apply_to(format!("{hits}/{} ({:.0}%)", truth.len(), recall * 100.0))
    );
    println!();
}
