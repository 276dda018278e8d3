//! Model export and loading
//!
//! The final model is written three ways:
//! - `wildfire_model_final.mpk`: compact half-precision record
//! - `saved_model/`: full-precision record with `config.json` and `class_names.json`
//! - `wildfire_model.bin`: binary half-precision record for deployment

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::Module,
    record::{
        BinFileRecorder, CompactRecorder, FullPrecisionSettings, HalfPrecisionSettings,
        NamedMpkFileRecorder,
    },
    tensor::backend::Backend,
};
use tracing::info;

use crate::model::{WildfireCnn, WildfireCnnConfig};
use crate::utils::error::{Result, WildfireError};

pub const FINAL_MODEL_NAME: &str = "wildfire_model_final";
pub const SAVED_MODEL_DIR: &str = "saved_model";
pub const DEPLOY_MODEL_NAME: &str = "wildfire_model";

const SAVED_MODEL_RECORD: &str = "model";
const CONFIG_FILE: &str = "config.json";
const CLASS_NAMES_FILE: &str = "class_names.json";

/// Files written by [`export_model`]
#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub final_model: PathBuf,
    pub saved_model_dir: PathBuf,
    pub deploy_model: PathBuf,
}

fn model_err(action: &str, path: &Path, e: impl std::fmt::Debug) -> WildfireError {
    WildfireError::Model(format!("Failed to {} {}: {:?}", action, path.display(), e))
}

/// Write the model in all three formats under `models_dir`
pub fn export_model<B: Backend>(
    model: &WildfireCnn<B>,
    config: &WildfireCnnConfig,
    class_names: &[String],
    models_dir: &Path,
) -> Result<ExportPaths> {
    fs::create_dir_all(models_dir)?;

    let final_base = models_dir.join(FINAL_MODEL_NAME);
    model
        .clone()
        .save_file(final_base.clone(), &CompactRecorder::new())
        .map_err(|e| model_err("save", &final_base, e))?;
    let final_model = final_base.with_extension("mpk");
    info!("Model saved to {}", final_model.display());

    let saved_model_dir = models_dir.join(SAVED_MODEL_DIR);
    save_model_dir(model, config, class_names, &saved_model_dir)?;
    info!("Model directory saved to {}", saved_model_dir.display());

    let deploy_base = models_dir.join(DEPLOY_MODEL_NAME);
    model
        .clone()
        .save_file(
            deploy_base.clone(),
            &BinFileRecorder::<HalfPrecisionSettings>::new(),
        )
        .map_err(|e| model_err("save", &deploy_base, e))?;
    let deploy_model = deploy_base.with_extension("bin");
    info!("Deployment model saved to {}", deploy_model.display());

    Ok(ExportPaths {
        final_model,
        saved_model_dir,
        deploy_model,
    })
}

/// Self-describing model directory
pub fn save_model_dir<B: Backend>(
    model: &WildfireCnn<B>,
    config: &WildfireCnnConfig,
    class_names: &[String],
    dir: &Path,
) -> Result<()> {
    fs::create_dir_all(dir)?;

    let record = dir.join(SAVED_MODEL_RECORD);
    model
        .clone()
        .save_file(
            record.clone(),
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
        )
        .map_err(|e| model_err("save", &record, e))?;

    config.save(dir.join(CONFIG_FILE))?;
    fs::write(
        dir.join(CLASS_NAMES_FILE),
        serde_json::to_string_pretty(class_names)?,
    )?;
    Ok(())
}

/// Load a model written by this module
///
/// A directory is read as a saved-model directory, `.bin` with the binary
/// recorder, anything else as a compact `.mpk` record. `config` is ignored
/// for directories, which carry their own.
pub fn load_model<B: Backend>(
    path: &Path,
    config: &WildfireCnnConfig,
    device: &B::Device,
) -> Result<WildfireCnn<B>> {
    if path.is_dir() {
        return load_model_dir(path, device).map(|(model, _, _)| model);
    }

    let is_bin = path.extension().is_some_and(|ext| ext == "bin");
    let exists = path.exists()
        || path.with_extension(if is_bin { "bin" } else { "mpk" }).exists();
    if !exists {
        return Err(WildfireError::PathNotFound(path.to_path_buf()));
    }

    let model = config.init::<B>(device);
    let model = if is_bin {
        model.load_file(
            path.to_path_buf(),
            &BinFileRecorder::<HalfPrecisionSettings>::new(),
            device,
        )
    } else {
        model.load_file(path.to_path_buf(), &CompactRecorder::new(), device)
    };
    model.map_err(|e| model_err("load", path, e))
}

/// Load a saved-model directory: weights, architecture and class names
pub fn load_model_dir<B: Backend>(
    dir: &Path,
    device: &B::Device,
) -> Result<(WildfireCnn<B>, WildfireCnnConfig, Vec<String>)> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Err(WildfireError::PathNotFound(config_path));
    }
    let config = WildfireCnnConfig::load(&config_path)
        .map_err(|e| WildfireError::Config(format!("{}: {:?}", config_path.display(), e)))?;

    let class_names: Vec<String> =
        serde_json::from_str(&fs::read_to_string(dir.join(CLASS_NAMES_FILE))?)?;

    let record = dir.join(SAVED_MODEL_RECORD);
    let model = config
        .init::<B>(device)
        .load_file(
            record.clone(),
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            device,
        )
        .map_err(|e| model_err("load", &record, e))?;

    Ok((model, config, class_names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn tiny() -> (WildfireCnn<TestBackend>, WildfireCnnConfig) {
        let config = WildfireCnnConfig::new(vec![4], vec![8]).with_image_size(16);
        let model = config.init::<TestBackend>(&Default::default());
        (model, config)
    }

    fn probabilities(model: &WildfireCnn<TestBackend>, input: Tensor<TestBackend, 4>) -> Vec<f32> {
        model.forward_probability(input).into_data().to_vec().unwrap()
    }

    fn class_names() -> Vec<String> {
        vec!["nowildfire".to_string(), "wildfire".to_string()]
    }

    #[test]
    fn test_export_writes_three_formats() {
        let dir = TempDir::new().unwrap();
        let (model, config) = tiny();
        let paths = export_model(&model, &config, &class_names(), dir.path()).unwrap();

        assert!(paths.final_model.exists());
        assert!(paths.deploy_model.exists());
        assert!(paths.saved_model_dir.join("model.mpk").exists());
        assert!(paths.saved_model_dir.join("config.json").exists());
        assert!(paths.saved_model_dir.join("class_names.json").exists());
    }

    #[test]
    fn test_saved_model_dir_roundtrip() {
        let dir = TempDir::new().unwrap();
        let (model, config) = tiny();
        let device = Default::default();
        save_model_dir(&model, &config, &class_names(), dir.path()).unwrap();

        let (loaded, loaded_config, names) =
            load_model_dir::<TestBackend>(dir.path(), &device).unwrap();
        assert_eq!(loaded_config.image_size, 16);
        assert_eq!(names, class_names());

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 16, 16], &device);
        let a = probabilities(&model, input.clone());
        let b = probabilities(&loaded, input);
        assert!((a[0] - b[0]).abs() < 1e-5);
    }

    #[test]
    fn test_load_compact_and_bin() {
        let dir = TempDir::new().unwrap();
        let (model, config) = tiny();
        let device = Default::default();
        let paths = export_model(&model, &config, &class_names(), dir.path()).unwrap();

        assert!(load_model::<TestBackend>(&paths.final_model, &config, &device).is_ok());
        assert!(load_model::<TestBackend>(&paths.deploy_model, &config, &device).is_ok());
        assert!(load_model::<TestBackend>(&paths.saved_model_dir, &config, &device).is_ok());
    }

    #[test]
    fn test_load_missing_is_error() {
        let dir = TempDir::new().unwrap();
        let (_, config) = tiny();
        let result = load_model::<TestBackend>(&dir.path().join("nope.mpk"), &config, &Default::default());
        assert!(matches!(result, Err(WildfireError::PathNotFound(_))));
    }
}
