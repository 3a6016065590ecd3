use console::Style;
use zstack_core::config::FusionConfig;
use zstack_core::grid::{DepthMap, GridSize};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
        }
    }
}

pub fn print_fusion_summary(config: &FusionConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Focus Stack Fusion"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(18)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Strategy"),
        s.method.apply_to(&config.strategy)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Consistency"),
        s.method.apply_to(config.consistency)
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Levels"),
        s.value.apply_to(&config.levels)
    );

    match &config.artifacts {
        Some(options) => {
            println!(
                "  {:<14}{} {}",
                s.label.apply_to("Artifacts"),
                s.method.apply_to(options.method),
                s.label.apply_to(format!(
                    "(ksize={}, support={}, detail>={}, blur={})",
                    options.laplacian_ksize,
                    options.support_ratio,
                    options.detail_threshold,
                    options.blur_radius
                ))
            );
        }
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Artifacts"),
            s.disabled.apply_to("off")
        ),
    }

    match &config.repair {
        Some(repair) => println!(
            "  {:<14}{} {}",
            s.label.apply_to("Repair"),
            s.value.apply_to(format!("threshold {}", repair.threshold)),
            s.label.apply_to(format!("(background slice {})", repair.background_slice))
        ),
        None => println!(
            "  {:<14}{}",
            s.label.apply_to("Repair"),
            s.disabled.apply_to("off")
        ),
    }
    println!();
}

/// Share of pixels each slice contributed, one line per slice.
pub fn print_depth_histogram(title: &str, depth: &DepthMap, slices: usize) {
    let s = Styles::new();
    let total = GridSize::of(depth).pixel_count().max(1);

    let mut counts = vec![0usize; slices];
    for &d in depth.iter() {
        if let Some(c) = counts.get_mut(d as usize) {
            *c += 1;
        }
    }

    println!("  {}", s.header.apply_to(title));
    for (i, &count) in counts.iter().enumerate() {
        let share = count as f64 / total as f64;
        let bar = "\u{2588}".repeat((share * 40.0).round() as usize);
        println!(
            "  {:<14}{:>6.1}%  {}",
            s.label.apply_to(format!("slice {i}")),
            share * 100.0,
            s.method.apply_to(bar)
        );
    }
    println!();
}

pub fn print_row(label: &str, value: impl std::fmt::Display) {
    let s = Styles::new();
    println!("  {:<14}{}", s.label.apply_to(label), s.value.apply_to(value));
}
