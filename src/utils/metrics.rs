//! Metrics Module for Model Evaluation
//!
//! Metrics for the binary wildfire classifier:
//! - Accuracy, precision, recall, F1 at a decision threshold
//! - Confusion matrix
//! - Per-class classification report
//! - ROC curve and area under it

use serde::{Deserialize, Serialize};

/// Default decision threshold on the wildfire probability
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Threshold-based metrics with the positive class at index 1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BinaryMetrics {
    /// Total number of samples evaluated
    pub total_samples: usize,

    /// Overall accuracy (correct / total)
    pub accuracy: f64,

    /// Precision of the positive class
    pub precision: f64,

    /// Recall of the positive class
    pub recall: f64,

    /// F1 of the positive class
    pub f1: f64,

    /// ROC AUC, `None` when only one class is present
    pub auc: Option<f64>,

    /// Confusion matrix
    pub confusion_matrix: ConfusionMatrix,
}

impl BinaryMetrics {
    /// Compute metrics from positive-class probabilities and 0/1 labels
    pub fn from_probabilities(probabilities: &[f32], labels: &[usize], threshold: f32) -> Self {
        assert_eq!(
            probabilities.len(),
            labels.len(),
            "Probabilities and labels must have same length"
        );

        if probabilities.is_empty() {
            return Self {
                confusion_matrix: ConfusionMatrix::new(2),
                ..Self::default()
            };
        }

        let predictions = threshold_predictions(probabilities, threshold);
        let confusion_matrix = ConfusionMatrix::from_predictions(&predictions, labels, 2);
        let positive = ClassMetrics::from_confusion_matrix(&confusion_matrix, 1);
        let auc = RocCurve::compute(probabilities, labels).auc();

        Self {
            total_samples: probabilities.len(),
            accuracy: confusion_matrix.accuracy(),
            precision: positive.precision,
            recall: positive.recall,
            f1: positive.f1,
            auc,
            confusion_matrix,
        }
    }

    /// Pretty print metrics
    pub fn display(&self) -> String {
        let auc = self
            .auc
            .map(|a| format!("{:6.4}", a))
            .unwrap_or_else(|| "   n/a".to_string());

        let mut output = String::new();
        output.push_str("╔══════════════════════════════════════╗\n");
        output.push_str("║          Evaluation Metrics          ║\n");
        output.push_str("╠══════════════════════════════════════╣\n");
        output.push_str(&format!("║ Accuracy:        {:6.2}%             ║\n", self.accuracy * 100.0));
        output.push_str(&format!("║ Precision:       {:6.2}%             ║\n", self.precision * 100.0));
        output.push_str(&format!("║ Recall:          {:6.2}%             ║\n", self.recall * 100.0));
        output.push_str(&format!("║ F1:              {:6.2}%             ║\n", self.f1 * 100.0));
        output.push_str(&format!("║ AUC:             {}              ║\n", auc));
        output.push_str(&format!("║ Total Samples:   {:7}             ║\n", self.total_samples));
        output.push_str("╚══════════════════════════════════════╝\n");
        output
    }
}

impl std::fmt::Display for BinaryMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// `1` where `p > threshold`, else `0`
pub fn threshold_predictions(probabilities: &[f32], threshold: f32) -> Vec<usize> {
    probabilities
        .iter()
        .map(|&p| usize::from(p > threshold))
        .collect()
}

/// Per-class metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    /// Class index
    pub class_idx: usize,

    /// Class name (if available)
    pub class_name: Option<String>,

    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,

    /// Precision = TP / (TP + FP)
    pub precision: f64,

    /// Recall = TP / (TP + FN)
    pub recall: f64,

    /// F1 = 2 * (precision * recall) / (precision + recall)
    pub f1: f64,

    /// Support = number of actual samples of this class
    pub support: usize,
}

impl ClassMetrics {
    /// Calculate metrics for a class from confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix, class_idx: usize) -> Self {
        let true_positives = cm.get(class_idx, class_idx);

        // Predicted as this class but actually another
        let false_positives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(i, class_idx))
            .sum();

        // Actually this class but predicted as another
        let false_negatives: usize = (0..cm.num_classes)
            .filter(|&i| i != class_idx)
            .map(|i| cm.get(class_idx, i))
            .sum();

        let true_negatives = cm.total() - true_positives - false_positives - false_negatives;
        let support = true_positives + false_negatives;

        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, true_positives + false_negatives);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            class_idx,
            class_name: None,
            true_positives,
            false_positives,
            false_negatives,
            true_negatives,
            precision,
            recall,
            f1,
            support,
        }
    }

    /// Set the class name
    pub fn with_name(mut self, name: &str) -> Self {
        self.class_name = Some(name.to_string());
        self
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

/// Confusion Matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Number of classes
    pub num_classes: usize,

    /// Row = actual, column = predicted, flat row-major
    pub matrix: Vec<usize>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConfusionMatrix {
    /// Create a new empty confusion matrix
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            matrix: vec![0; num_classes * num_classes],
        }
    }

    /// Create confusion matrix from predictions and ground truth
    pub fn from_predictions(
        predictions: &[usize],
        ground_truth: &[usize],
        num_classes: usize,
    ) -> Self {
        let mut cm = Self::new(num_classes);
        for (&pred, &actual) in predictions.iter().zip(ground_truth.iter()) {
            cm.add(actual, pred);
        }
        cm
    }

    /// Add a single prediction to the matrix
    pub fn add(&mut self, actual: usize, predicted: usize) {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted] += 1;
        }
    }

    /// Get the count at (actual, predicted)
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        if actual < self.num_classes && predicted < self.num_classes {
            self.matrix[actual * self.num_classes + predicted]
        } else {
            0
        }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().sum()
    }

    /// Diagonal sum
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|i| self.get(i, i)).sum()
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Rows as nested vectors, for plotting
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.num_classes)
            .map(|row| {
                (0..self.num_classes)
                    .map(|col| self.get(row, col) as f64)
                    .collect()
            })
            .collect()
    }

    /// Pretty print the confusion matrix
    pub fn display(&self, class_names: &[&str]) -> String {
        let mut output = String::new();
        output.push_str("\nConfusion Matrix (rows=actual, cols=predicted):\n\n");

        let width = class_names.iter().map(|n| n.len()).max().unwrap_or(0).max(6);
        output.push_str(&" ".repeat(width + 1));
        for col in 0..self.num_classes {
            let name = class_names.get(col).copied().unwrap_or("?");
            output.push_str(&format!(" {:>w$}", name, w = width));
        }
        output.push('\n');

        for row in 0..self.num_classes {
            let name = class_names.get(row).copied().unwrap_or("?");
            output.push_str(&format!("{:>w$} ", name, w = width));
            for col in 0..self.num_classes {
                output.push_str(&format!(" {:>w$}", self.get(row, col), w = width));
            }
            output.push('\n');
        }

        output.push_str(&format!("\nAccuracy: {:.2}%\n", self.accuracy() * 100.0));
        output
    }
}

/// Precision / recall / F1 / support per class with averages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub total_support: usize,
}

impl ClassificationReport {
    pub fn new(cm: &ConfusionMatrix, class_names: &[&str]) -> Self {
        let classes = (0..cm.num_classes)
            .map(|idx| {
                let m = ClassMetrics::from_confusion_matrix(cm, idx);
                match class_names.get(idx) {
                    Some(name) => m.with_name(name),
                    None => m,
                }
            })
            .collect();

        Self {
            classes,
            accuracy: cm.accuracy(),
            total_support: cm.total(),
        }
    }

    /// Unweighted mean over classes of (precision, recall, f1)
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        let n = self.classes.len().max(1) as f64;
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, m| {
            (acc.0 + m.precision, acc.1 + m.recall, acc.2 + m.f1)
        });
        (sum.0 / n, sum.1 / n, sum.2 / n)
    }

    /// Support-weighted mean over classes of (precision, recall, f1)
    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        if self.total_support == 0 {
            return (0.0, 0.0, 0.0);
        }
        let total = self.total_support as f64;
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, m| {
            let w = m.support as f64;
            (acc.0 + m.precision * w, acc.1 + m.recall * w, acc.2 + m.f1 * w)
        });
        (sum.0 / total, sum.1 / total, sum.2 / total)
    }

    /// Tabular text with `digits` decimal places
    pub fn format(&self, digits: usize) -> String {
        let name_width = self
            .classes
            .iter()
            .filter_map(|c| c.class_name.as_ref().map(|n| n.len()))
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());
        let col = digits + 6;

        let mut out = String::new();
        out.push_str(&format!(
            "{:>nw$} {:>cw$} {:>cw$} {:>cw$} {:>cw$}\n\n",
            "",
            "precision",
            "recall",
            "f1-score",
            "support",
            nw = name_width,
            cw = col.max(9)
        ));

        for m in &self.classes {
            let name = m
                .class_name
                .clone()
                .unwrap_or_else(|| m.class_idx.to_string());
            out.push_str(&format!(
                "{:>nw$} {:>cw$.d$} {:>cw$.d$} {:>cw$.d$} {:>cw$}\n",
                name,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                nw = name_width,
                cw = col.max(9),
                d = digits
            ));
        }
        out.push('\n');

        out.push_str(&format!(
            "{:>nw$} {:>cw$} {:>cw$} {:>cw$.d$} {:>cw$}\n",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.total_support,
            nw = name_width,
            cw = col.max(9),
            d = digits
        ));

        for (label, (p, r, f)) in [("macro avg", self.macro_avg()), ("weighted avg", self.weighted_avg())] {
            out.push_str(&format!(
                "{:>nw$} {:>cw$.d$} {:>cw$.d$} {:>cw$.d$} {:>cw$}\n",
                label,
                p,
                r,
                f,
                self.total_support,
                nw = name_width,
                cw = col.max(9),
                d = digits
            ));
        }

        out
    }
}

/// A point of the ROC curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub threshold: f32,
    pub fpr: f64,
    pub tpr: f64,
}

/// Receiver operating characteristic of a scorer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    pub positives: usize,
    pub negatives: usize,
}

impl RocCurve {
    /// Sweep thresholds from the highest score down
    ///
    /// Tied scores produce a single point. The curve starts at (0, 0) with
    /// an infinite threshold.
    pub fn compute(scores: &[f32], labels: &[usize]) -> Self {
        let mut pairs: Vec<(f32, bool)> = scores
            .iter()
            .zip(labels.iter())
            .map(|(&s, &l)| (s, l == 1))
            .collect();
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let positives = pairs.iter().filter(|(_, p)| *p).count();
        let negatives = pairs.len() - positives;

        let mut points = vec![RocPoint {
            threshold: f32::INFINITY,
            fpr: 0.0,
            tpr: 0.0,
        }];

        let (mut tp, mut fp) = (0usize, 0usize);
        for (i, &(score, is_pos)) in pairs.iter().enumerate() {
            if is_pos {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_tie = pairs.get(i + 1).map_or(true, |next| next.0 != score);
            if last_of_tie {
                points.push(RocPoint {
                    threshold: score,
                    fpr: ratio(fp, negatives),
                    tpr: ratio(tp, positives),
                });
            }
        }

        Self {
            points,
            positives,
            negatives,
        }
    }

    /// Trapezoidal area under the curve
    pub fn auc(&self) -> Option<f64> {
        if self.positives == 0 || self.negatives == 0 {
            return None;
        }
        let area = self
            .points
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum();
        Some(area)
    }

    pub fn as_xy(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.fpr, p.tpr)).collect()
    }
}

/// Running average for tracking metrics during training
#[derive(Debug, Clone, Default)]
pub struct RunningAverage {
    sum: f64,
    count: usize,
}

impl RunningAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value with weight (e.g. batch size)
    pub fn add_weighted(&mut self, value: f64, weight: usize) {
        self.sum += value * weight as f64;
        self.count += weight;
    }

    pub fn add(&mut self, value: f64) {
        self.add_weighted(value, 1);
    }

    pub fn average(&self) -> f64 {
        if self.count > 0 {
            self.sum / self.count as f64
        } else {
            0.0
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix() {
        // (pred, gt): (1,1) (0,0) (1,0) (0,1) (1,1) (0,0) (0,0)
        let predictions = vec![1, 0, 1, 0, 1, 0, 0];
        let ground_truth = vec![1, 0, 0, 1, 1, 0, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);

        assert_eq!(cm.get(0, 0), 3);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(1, 0), 1);
        assert_eq!(cm.get(1, 1), 2);
        assert_eq!(cm.total(), 7);
        assert!((cm.accuracy() - 5.0 / 7.0).abs() < 1e-9);
        assert_eq!(cm.rows(), vec![vec![3.0, 1.0], vec![1.0, 2.0]]);
    }

    #[test]
    fn test_class_metrics() {
        let predictions = vec![0, 0, 0, 1, 1];
        let ground_truth = vec![0, 0, 1, 1, 0];

        let cm = ConfusionMatrix::from_predictions(&predictions, &ground_truth, 2);
        let class0 = ClassMetrics::from_confusion_matrix(&cm, 0);

        // Class 0: TP=2, FP=1, FN=1, TN=1
        assert_eq!(class0.true_positives, 2);
        assert_eq!(class0.false_positives, 1);
        assert_eq!(class0.false_negatives, 1);
        assert_eq!(class0.true_negatives, 1);
        assert!((class0.precision - 2.0 / 3.0).abs() < 0.001);
        assert!((class0.recall - 2.0 / 3.0).abs() < 0.001);
    }

    #[test]
    fn test_precision_zero_when_nothing_predicted_positive() {
        let metrics = BinaryMetrics::from_probabilities(&[0.1, 0.2, 0.3], &[1, 0, 1], 0.5);
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f1, 0.0);
        assert!((metrics.accuracy - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_strict() {
        assert_eq!(threshold_predictions(&[0.5, 0.51, 0.49], 0.5), vec![0, 1, 0]);
    }

    #[test]
    fn test_binary_metrics() {
        let probs = [0.9, 0.8, 0.3, 0.6, 0.2, 0.1];
        let labels = [1, 1, 1, 0, 0, 0];
        let m = BinaryMetrics::from_probabilities(&probs, &labels, 0.5);

        // TP=2 FP=1 FN=1 TN=2
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-9);
        assert!((m.accuracy - 4.0 / 6.0).abs() < 1e-9);
        // 8 of 9 positive/negative pairs ranked correctly
        assert!((m.auc.unwrap() - 8.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_roc_perfect_and_inverted() {
        let labels = [0, 0, 1, 1];
        let perfect = RocCurve::compute(&[0.1, 0.2, 0.8, 0.9], &labels);
        assert!((perfect.auc().unwrap() - 1.0).abs() < 1e-12);

        let inverted = RocCurve::compute(&[0.9, 0.8, 0.2, 0.1], &labels);
        assert!(inverted.auc().unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_roc_constant_scorer_is_half() {
        let roc = RocCurve::compute(&[0.5; 6], &[0, 1, 0, 1, 1, 0]);
        // Ties collapse to a single step from (0,0) to (1,1)
        assert_eq!(roc.points.len(), 2);
        assert!((roc.auc().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_single_class_has_no_auc() {
        let roc = RocCurve::compute(&[0.2, 0.7], &[1, 1]);
        assert!(roc.auc().is_none());
        let m = BinaryMetrics::from_probabilities(&[0.2, 0.7], &[1, 1], 0.5);
        assert!(m.auc.is_none());
    }

    #[test]
    fn test_roc_ends_at_one_one() {
        let roc = RocCurve::compute(&[0.3, 0.6, 0.9, 0.1], &[0, 1, 1, 0]);
        let last = roc.points.last().unwrap();
        assert_eq!((last.fpr, last.tpr), (1.0, 1.0));
        assert!(roc.points[0].threshold.is_infinite());
    }

    #[test]
    fn test_classification_report() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1, 0], &[0, 0, 1, 1, 0, 1], 2);
        let report = ClassificationReport::new(&cm, &["nowildfire", "wildfire"]);

        assert_eq!(report.classes[0].support, 3);
        assert_eq!(report.classes[1].support, 3);
        let (p, r, f) = report.macro_avg();
        assert!((p - 2.0 / 3.0).abs() < 1e-9);
        assert!((r - 2.0 / 3.0).abs() < 1e-9);
        assert!((f - 2.0 / 3.0).abs() < 1e-9);

        let text = report.format(4);
        assert!(text.contains("nowildfire"));
        assert!(text.contains("0.6667"));
        assert!(text.contains("weighted avg"));
    }

    #[test]
    fn test_running_average_weighted() {
        let mut avg = RunningAverage::new();
        avg.add_weighted(1.0, 3);
        avg.add(5.0);
        assert_eq!(avg.count(), 4);
        assert!((avg.average() - 2.0).abs() < 1e-12);
    }
}
