use tessera::{DebugInfo, GeocodeResponse, ResponseFeature};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

const SAMPLES: usize = 5;

pub fn print_response(query: &str, response: &GeocodeResponse, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⌖  Geocoding: \"{}\"", query), ansi::CYAN)));
    println!("  {} {}", palette.dim("tokens:"), palette.paint(response.query.join(" "), ansi::YELLOW));

    if let Some(debug) = &response.debug {
        println!("\n{}", palette.paint("━━━ Phrasematches ━━━", ansi::GRAY));
        print_phrasematches(debug, &palette);

        println!("\n{}", palette.paint("━━━ Spatialmatch ━━━", ansi::GRAY));
        print_spatialmatch(debug, &palette);
    }

    println!("\n{}", palette.paint("━━━ Results ━━━", ansi::GRAY));
    if response.features.is_empty() {
        println!("{}", palette.dim("  No results"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • No source has a phrase close enough to the query");
        println!("  • Matching covers did not share a tile");
        println!("  • Covers pointed at features missing from storage");
        println!("\n{}", palette.dim("  Tip: Set RUST_LOG=tessera=trace to see skipped covers"));
    } else {
        print_results(&response.features, &palette);
    }

    if let Some(debug) = &response.debug {
        let m = &debug.metrics;
        println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
        println!(
            "  Total: {}  │  Phrasematch: {}  │  Spatialmatch: {}  │  Verify: {}  │  Context: {}",
            palette.paint(format!("{:?}", m.total), ansi::GREEN),
            palette.paint(format!("{:?}", m.phrasematch), ansi::CYAN),
            palette.dim(format!("{:?}", m.spatialmatch)),
            palette.dim(format!("{:?}", m.verifymatch)),
            palette.dim(format!("{:?}", m.context)),
        );
        println!(
            "  {}",
            palette.dim(format!(
                "{} phrasematches → {} covers → {} spatialmatches → {} verified → {} unique",
                m.counts.phrasematches, m.counts.covers, m.counts.spatialmatches, m.counts.verified, m.counts.deduped
            ))
        );
    }
    println!();
}

fn print_phrasematches(debug: &DebugInfo, palette: &ansi::Palette) {
    for source in &debug.phrasematches {
        let label = format!("{} ({}):", source.source, source.ordinal);
        println!(
            "  {} {}",
            palette.paint(label, ansi::BLUE),
            if source.phrasematches.is_empty() {
                palette.dim("✗ 0 phrases")
            } else {
                palette.paint(format!("✓ {} phrases", source.phrasematches.len()), ansi::GREEN)
            }
        );

        for pm in source.phrasematches.iter().take(SAMPLES) {
            println!(
                "    {} {} {}",
                palette.paint(format!("{:#b}", pm.mask), ansi::YELLOW),
                palette.paint(&pm.phrase, ansi::CYAN),
                palette.dim(format!("weight {:.2} edits {}", pm.weight, pm.edit_distance))
            );
        }
        if source.phrasematches.len() > SAMPLES {
            println!("    {}", palette.dim(format!("... +{} more", source.phrasematches.len() - SAMPLES)));
        }
    }
}

fn print_spatialmatch(debug: &DebugInfo, palette: &ansi::Palette) {
    let Some(sm) = &debug.spatialmatch else {
        println!("  {}", palette.dim("No spatialmatch"));
        return;
    };

    println!("  {} {}", palette.dim("relev:"), palette.paint(format!("{:.3}", sm.relev), ansi::GREEN));
    for cover in &sm.covers {
        println!(
            "    {} {} {} {}",
            palette.paint(format!("tmpid {}", cover.tmpid), ansi::GRAY),
            palette.paint(format!("{:#b}", cover.mask), ansi::YELLOW),
            palette.paint(&cover.text, ansi::CYAN),
            palette.dim(format!("{}/{}/{} scoredist {:.2}", cover.zoom, cover.x, cover.y, cover.scoredist))
        );
    }
}

fn print_results(features: &[ResponseFeature], palette: &ansi::Palette) {
    for (idx, feature) in features.iter().enumerate() {
        println!(
            "  {} {} {} {}",
            palette.paint(format!("[{}]", idx), ansi::GRAY),
            palette.bold(palette.paint(&feature.place_name, ansi::GREEN)),
            palette.dim("│"),
            palette.paint(format!("relevance {:.3}", feature.relevance), ansi::YELLOW),
        );
        let center = feature.center.map(|[lon, lat]| format!("{lon:.5},{lat:.5}")).unwrap_or_else(|| "-".to_string());
        println!(
            "      {} {}  {} {}",
            palette.dim("id:"),
            palette.paint(&feature.id, ansi::BLUE),
            palette.dim("│ center:"),
            palette.paint(center, ansi::CYAN)
        );
    }
}
