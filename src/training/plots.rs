//! Training report figures: history curves, confusion matrix, ROC curve

use std::path::Path;

use crate::training::history::{EpochRecord, History};
use crate::utils::charts::{
    heatmap, line_chart, DataSeries, Figure, COLOR_PRIMARY, COLOR_SECONDARY, COLOR_TRAIN,
    COLOR_VALID,
};
use crate::utils::error::Result;
use crate::utils::metrics::{ConfusionMatrix, RocCurve};

type Getter = fn(&EpochRecord) -> f64;

/// 2x2 grid: accuracy, loss, precision, recall (train vs validation)
pub fn plot_training_history(history: &History, path: &Path) -> Result<()> {
    let panels: [(&str, &str, Getter, Getter, Option<(f64, f64)>); 4] = [
        ("Accuracy", "Model Accuracy", |r| r.accuracy, |r| r.val_accuracy, Some((0.0, 1.0))),
        ("Loss", "Model Loss", |r| r.loss, |r| r.val_loss, None),
        ("Precision", "Model Precision", |r| r.precision, |r| r.val_precision, Some((0.0, 1.0))),
        ("Recall", "Model Recall", |r| r.recall, |r| r.val_recall, Some((0.0, 1.0))),
    ];

    let mut figure = Figure::new("Training History", 2, 2);
    for (i, (metric, title, train, valid, range)) in panels.into_iter().enumerate() {
        let series = [
            DataSeries::new(&format!("Train {metric}"), COLOR_TRAIN, history.series(train)),
            DataSeries::new(&format!("Val {metric}"), COLOR_VALID, history.series(valid)),
        ];
        figure.push(line_chart(
            figure.panel(i),
            title,
            "Epoch",
            metric,
            &series,
            range,
        ));
    }

    figure.save(path)?;
    Ok(())
}

/// Annotated counts, true label on the rows
pub fn plot_confusion_matrix(cm: &ConfusionMatrix, class_names: &[String], path: &Path) -> Result<()> {
    let mut figure = Figure::new("Confusion Matrix", 1, 1);
    let values = cm.rows();
    figure.push(heatmap(
        figure.panel(0),
        "Confusion Matrix",
        "Predicted Label",
        "True Label",
        class_names,
        &values,
    ));
    figure.save(path)?;
    Ok(())
}

/// ROC curve against the chance diagonal
pub fn plot_roc_curve(roc: &RocCurve, path: &Path) -> Result<()> {
    let label = match roc.auc() {
        Some(auc) => format!("ROC curve (AUC = {auc:.4})"),
        None => "ROC curve (AUC = n/a)".to_string(),
    };
    let series = [
        DataSeries::new(&label, COLOR_SECONDARY, roc.as_xy()),
        DataSeries::new("Random Classifier", COLOR_PRIMARY, vec![(0.0, 0.0), (1.0, 1.0)]).dashed(),
    ];

    let mut figure = Figure::new("Receiver Operating Characteristic (ROC) Curve", 1, 1);
    figure.push(line_chart(
        figure.panel(0),
        "ROC",
        "False Positive Rate",
        "True Positive Rate",
        &series,
        Some((0.0, 1.05)),
    ));
    figure.save(path)?;
    Ok(())
}
