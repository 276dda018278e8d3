//! Plain-text EDA summary report

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::dataset::loader::{display_class, display_split, ClassDistribution};
use crate::dataset::{CLASS_NAMES, WILDFIRE_LABEL};
use crate::eda::properties::{display_order, PropertyTable};
use crate::utils::error::Result;
use crate::utils::{format_number, percentage};

/// Class balance verdict from the wildfire : no-wildfire ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceStatus {
    Balanced,
    SlightlyImbalanced,
}

impl BalanceStatus {
    /// Balanced strictly inside (0.8, 1.2); an undefined ratio is not balanced
    pub fn classify(ratio: Option<f64>) -> Self {
        match ratio {
            Some(r) if r > 0.8 && r < 1.2 => Self::Balanced,
            _ => Self::SlightlyImbalanced,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Balanced => "Balanced",
            Self::SlightlyImbalanced => "Slightly Imbalanced",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Balanced => "No special handling needed",
            Self::SlightlyImbalanced => "Consider class weights or SMOTE",
        }
    }
}

/// wildfire / nowildfire, `None` when there are no negatives
pub fn imbalance_ratio(wildfire: usize, no_wildfire: usize) -> Option<f64> {
    (no_wildfire > 0).then(|| wildfire as f64 / no_wildfire as f64)
}

/// Image count from which the dataset is considered large enough for a CNN
const LARGE_DATASET: usize = 10_000;

fn rule() -> String {
    "=".repeat(70)
}

fn heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", rule());
}

/// Render the report text
pub fn render_summary_report(dist: &ClassDistribution, props: &PropertyTable) -> String {
    let total = dist.total();
    let wildfire_name = CLASS_NAMES[WILDFIRE_LABEL];
    let wildfire = dist.class_index(wildfire_name).map_or(0, |i| dist.class_total(i));
    let no_wildfire = total - wildfire;
    let ratio = imbalance_ratio(wildfire, no_wildfire);
    let status = BalanceStatus::classify(ratio);

    let mut out = String::new();
    let _ = writeln!(out);
    heading(&mut out, "WILDFIREGUARD AI - EXPLORATORY DATA ANALYSIS REPORT");
    let _ = writeln!(out);

    heading(&mut out, "1. DATASET OVERVIEW");
    let _ = writeln!(out, "Total Images: {}", format_number(total));
    let _ = writeln!(
        out,
        "  - Wildfire:     {} ({:.1}%)",
        format_number(wildfire),
        percentage(wildfire, total)
    );
    let _ = writeln!(
        out,
        "  - No Wildfire:  {} ({:.1}%)",
        format_number(no_wildfire),
        percentage(no_wildfire, total)
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Dataset Split:");
    for (s, split) in dist.splits.iter().enumerate() {
        let n = dist.split_total(s);
        let label = match display_split(split).as_str() {
            "Train" => "Training".to_string(),
            other => other.to_string(),
        };
        let _ = writeln!(
            out,
            "  - {:<14}{} ({:.1}%)",
            format!("{label}:"),
            format_number(n),
            percentage(n, total)
        );
    }
    let _ = writeln!(out);

    heading(&mut out, "2. CLASS BALANCE ANALYSIS");
    match ratio {
        Some(r) => {
            let _ = writeln!(
                out,
                "Class Imbalance Ratio: {r:.2}:1 (Wildfire:No Wildfire)"
            );
        }
        None => {
            let _ = writeln!(out, "Class Imbalance Ratio: n/a (no No Wildfire images)");
        }
    }
    let _ = writeln!(out, "Status: {}", status.label());
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommendation: {}", status.recommendation());
    let _ = writeln!(out);

    heading(&mut out, "3. IMAGE PROPERTIES");
    let _ = writeln!(out, "Image Dimensions:");
    match props.common_size() {
        Some((w, h)) => {
            let _ = writeln!(out, "  - Width:  {w} px (most common in sample)");
            let _ = writeln!(out, "  - Height: {h} px (most common in sample)");
        }
        None => {
            let _ = writeln!(out, "  - No images could be sampled");
        }
    }
    let _ = writeln!(out, "  - Format: RGB (3 channels)");
    let _ = writeln!(out);
    let _ = writeln!(out, "Pixel Statistics (Mean ± Std):");
    let channel_names = ["Red Channel:  ", "Green Channel:", "Blue Channel: "];
    for class in display_order(&dist.classes) {
        let _ = writeln!(out, "  {} Images:", display_class(&class));
        match props.channel_summary(&class) {
            Some(summary) => {
                for (name, s) in channel_names.iter().zip(summary) {
                    let _ = writeln!(out, "    - {name} {:.1} ± {:.1}", s.mean, s.std);
                }
            }
            None => {
                let _ = writeln!(out, "    - not sampled");
            }
        }
    }
    let _ = writeln!(out);

    heading(&mut out, "4. KEY INSIGHTS");
    let _ = writeln!(out, "✅ Dataset is organised into train/validation/test splits");
    if let Some((w, h)) = props.common_size() {
        let _ = writeln!(out, "✅ Most sampled images are {w}x{h} pixels");
    }
    let balance = match status {
        BalanceStatus::Balanced => "✅ Class distribution is relatively balanced",
        BalanceStatus::SlightlyImbalanced => "⚠️ Class distribution is imbalanced",
    };
    let _ = writeln!(out, "{balance}");
    let _ = writeln!(
        out,
        "✅ Dataset size ({} images) for CNN training",
        format_number(total)
    );
    let _ = writeln!(out);

    heading(&mut out, "5. RECOMMENDATIONS FOR MODELING");
    for line in [
        "Use data augmentation to increase training diversity",
        "Apply normalization (rescale to 0-1 range)",
        "Consider transfer learning from pre-trained models (optional)",
        "Use binary crossentropy loss for binary classification",
        "Monitor validation accuracy to prevent overfitting",
    ] {
        let _ = writeln!(out, "✅ {line}");
    }
    let expected = if status == BalanceStatus::Balanced && total >= LARGE_DATASET {
        "90-95%"
    } else {
        "80-90%"
    };
    let _ = writeln!(out, "✅ Expected accuracy: {expected} based on dataset quality");
    let _ = writeln!(out);

    heading(&mut out, "6. BUSINESS JUSTIFICATION");
    let large = total >= LARGE_DATASET;
    let quality = match (large, status) {
        (true, BalanceStatus::Balanced) => "HIGH",
        _ => "MODERATE",
    };
    let _ = writeln!(out, "Dataset Quality: {quality}");
    let _ = writeln!(out, "  - Real satellite images from verified government source");
    let size = if large { "Large" } else { "Limited" };
    let balance = match status {
        BalanceStatus::Balanced => "balanced",
        BalanceStatus::SlightlyImbalanced => "imbalanced",
    };
    let _ = writeln!(out, "  - {size} sample size ({} images) with {balance} classes", format_number(total));
    if props.common_size().is_some() {
        let _ = writeln!(out, "  - Standardized format for deep learning");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Business Relevance: HIGH");
    for line in [
        "Addresses real-world wildfire prediction problem",
        "Data from actual wildfire incidents (>0.01 acres burned)",
        "Geographic diversity (Canada-wide coverage)",
    ] {
        let _ = writeln!(out, "  - {line}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Model Applicability: HIGH");
    for line in [
        "Insurance risk assessment",
        "Emergency response planning",
        "Environmental monitoring",
        "Resource allocation optimization",
    ] {
        let _ = writeln!(out, "  - {line}");
    }
    let _ = writeln!(out);

    heading(&mut out, "END OF REPORT");
    out
}

/// Render the report, write it to `output_path` and return the text
pub fn generate_summary_report(
    dist: &ClassDistribution,
    props: &PropertyTable,
    output_path: &Path,
) -> Result<String> {
    println!("\n📝 Generating summary report...");
    let report = render_summary_report(dist, props);
    fs::write(output_path, &report)?;
    println!("{report}");
    println!("\n✅ Saved: eda_summary_report.txt");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eda::properties::ImageProperties;
    use std::path::PathBuf;

    fn distribution(wildfire: [usize; 3], no_wildfire: [usize; 3]) -> ClassDistribution {
        ClassDistribution {
            classes: vec!["nowildfire".to_string(), "wildfire".to_string()],
            splits: vec!["train".to_string(), "valid".to_string(), "test".to_string()],
            counts: vec![no_wildfire.to_vec(), wildfire.to_vec()],
        }
    }

    fn image(class: &str, mean: f64) -> ImageProperties {
        ImageProperties {
            path: PathBuf::from("x.png"),
            class_name: class.to_string(),
            width: 350,
            height: 350,
            mean: [mean; 3],
            std: [10.0; 3],
        }
    }

    #[test]
    fn test_balance_thresholds() {
        assert_eq!(BalanceStatus::classify(Some(1.0)), BalanceStatus::Balanced);
        assert_eq!(BalanceStatus::classify(Some(1.19)), BalanceStatus::Balanced);
        assert_eq!(BalanceStatus::classify(Some(0.8)), BalanceStatus::SlightlyImbalanced);
        assert_eq!(BalanceStatus::classify(Some(1.2)), BalanceStatus::SlightlyImbalanced);
        assert_eq!(BalanceStatus::classify(None), BalanceStatus::SlightlyImbalanced);
        assert_eq!(imbalance_ratio(5, 0), None);
        assert_eq!(imbalance_ratio(3, 2), Some(1.5));
    }

    #[test]
    fn test_report_sections_and_numbers() {
        let dist = distribution([15750, 3480, 3480], [14500, 2820, 2820]);
        let props = PropertyTable {
            images: vec![image("wildfire", 90.0), image("nowildfire", 60.0)],
        };
        let report = render_summary_report(&dist, &props);

        assert!(report.contains("Total Images: 42,850"));
        assert!(report.contains("  - Wildfire:     22,710 (53.0%)"));
        assert!(report.contains("Training:"));
        assert!(report.contains("Class Imbalance Ratio: 1.13:1"));
        assert!(report.contains("Status: Balanced"));
        assert!(report.contains("No special handling needed"));
        assert!(report.contains("Width:  350 px"));
        assert!(report.contains("90.0 ± 10.0"));
        assert!(report.contains("4. KEY INSIGHTS"));
        assert!(report.contains("Consider transfer learning"));
        assert!(report.contains("Expected accuracy: 90-95%"));
        assert!(report.contains("6. BUSINESS JUSTIFICATION"));
        assert!(report.contains("Dataset Quality: HIGH"));
        assert!(report.contains("Large sample size (42,850 images) with balanced classes"));
        assert!(report.contains("Insurance risk assessment"));
        assert!(report.contains("END OF REPORT"));
    }

    #[test]
    fn test_report_without_negatives() {
        let dist = distribution([4, 1, 1], [0, 0, 0]);
        let report = render_summary_report(&dist, &PropertyTable::default());
        assert!(report.contains("n/a"));
        assert!(report.contains("Slightly Imbalanced"));
        assert!(report.contains("No images could be sampled"));
        assert!(report.contains("Dataset Quality: MODERATE"));
        assert!(report.contains("Limited sample size (6 images) with imbalanced classes"));
        assert!(report.contains("Expected accuracy: 80-90%"));
        assert!(!report.contains("Standardized format"));
    }
}
