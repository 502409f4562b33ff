use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline configuration: working-directory roots, worker scripts,
/// and the environment forwarded to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root under which each run gets a timestamped download directory.
    #[serde(default = "default_download_root")]
    pub download_root: PathBuf,
    /// Root under which each run gets a timestamped output directory.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Print-panel root; holds `output/<timestamp>` and `csv` per run.
    #[serde(default = "default_panels_root")]
    pub panels_root: PathBuf,
    /// Interpreter used to launch the worker scripts.
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,
    /// Image-processing worker (downloads patterns, drives the image
    /// editor, uploads composites).
    #[serde(default = "default_image_script")]
    pub image_script: PathBuf,
    /// PDF-generation worker (drives the vector editor).
    #[serde(default = "default_pdf_script")]
    pub pdf_script: PathBuf,
    /// Catalog-update worker (pushes processed products to the shop).
    #[serde(default = "default_catalog_script")]
    pub catalog_script: PathBuf,
    /// Environment variables forwarded verbatim from the server process
    /// to every worker (storage credentials and region).
    #[serde(default = "default_env_passthrough")]
    pub env_passthrough: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_root: default_download_root(),
            output_root: default_output_root(),
            panels_root: default_panels_root(),
            interpreter: default_interpreter(),
            image_script: default_image_script(),
            pdf_script: default_pdf_script(),
            catalog_script: default_catalog_script(),
            env_passthrough: default_env_passthrough(),
        }
    }
}

fn default_download_root() -> PathBuf {
    PathBuf::from("Download")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("Output")
}

fn default_panels_root() -> PathBuf {
    PathBuf::from("printpanels")
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("python3")
}

fn default_image_script() -> PathBuf {
    PathBuf::from("Scripts/images.py")
}

fn default_pdf_script() -> PathBuf {
    PathBuf::from("Scripts/pdfs.py")
}

fn default_catalog_script() -> PathBuf {
    PathBuf::from("Scripts/process_products.py")
}

fn default_env_passthrough() -> Vec<String> {
    vec![
        "AWS_ACCESS_KEY_ID".to_string(),
        "AWS_SECRET_ACCESS_KEY".to_string(),
        "AWS_REGION".to_string(),
    ]
}
