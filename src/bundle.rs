//! Descriptor files shipped next to a frozen graph.
//!
//! A model directory is produced by the training side and looks like
//!
//! ```text
//! model/
//! ├── data.yaml    label remap + color map
//! ├── net.yaml     network hyperparameters (input size)
//! ├── train.yaml   training hyperparameters
//! ├── nodes.yaml   tensor names inside the graph
//! └── frozen_nchw.pb, frozen_nhwc.pb, optimized.pb, quantized.pb
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ModelVariant;
use crate::errors::{Result, SegError};

pub const DATA_FILE: &str = "data.yaml";
pub const NET_FILE: &str = "net.yaml";
pub const TRAIN_FILE: &str = "train.yaml";
pub const NODES_FILE: &str = "nodes.yaml";

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Raw dataset label to human readable name.
    #[serde(default)]
    pub label_map: BTreeMap<u32, String>,
    /// Raw dataset label to the class index the network predicts.
    pub label_remap: BTreeMap<u32, u32>,
    /// Raw dataset label to a color, stored blue-green-red.
    pub color_map: BTreeMap<u32, [u8; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ImgProp {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub img_prop: ImgProp,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct TrainConfig(pub serde_yaml::Mapping);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeNames {
    pub input_node: String,
    pub code_node: String,
    pub mask_node: String,
}

/// Everything read from the model directory at startup. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub dir: PathBuf,
    pub data: DataConfig,
    pub net: NetConfig,
    pub train: TrainConfig,
    pub nodes: NodeNames,
}

impl ModelBundle {
    /// Reads the four descriptor files in order, stopping at the first failure.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let data: DataConfig = read_yaml(dir, DATA_FILE)?;
        validate_data(&dir.join(DATA_FILE), &data)?;

        let net: NetConfig = read_yaml(dir, NET_FILE)?;
        if net.img_prop.depth != 3 {
            return Err(SegError::config(
                dir.join(NET_FILE),
                format!(
                    "img_prop.depth is {}, only 3-channel graphs are supported",
                    net.img_prop.depth
                ),
            ));
        }
        if net.img_prop.width == 0 || net.img_prop.height == 0 {
            return Err(SegError::config(
                dir.join(NET_FILE),
                "img_prop width and height must be non-zero",
            ));
        }

        let train: TrainConfig = read_yaml(dir, TRAIN_FILE)?;
        let nodes: NodeNames = read_yaml(dir, NODES_FILE)?;

        info!(
            dataset = data.name.as_deref().unwrap_or("unnamed"),
            net = net.name.as_deref().unwrap_or("unnamed"),
            width = net.img_prop.width,
            height = net.img_prop.height,
            classes = data.label_remap.len(),
            "Loaded model descriptors from {}",
            dir.display()
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            data,
            net,
            train,
            nodes,
        })
    }

    /// Path of the requested graph, checked for existence.
    pub fn graph_path(&self, variant: ModelVariant) -> Result<PathBuf> {
        let path = self.dir.join(variant.file_name());
        if path.is_file() {
            info!("Model file exists! Using model from {}", path.display());
            Ok(path)
        } else {
            Err(SegError::ModelNotFound { path })
        }
    }
}

fn read_yaml<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    debug!("Opening {}", path.display());

    let text = fs::read_to_string(&path).map_err(|e| SegError::Config {
        path: path.clone(),
        reason: "cannot read file".to_string(),
        source: Some(Box::new(e)),
    })?;

    serde_yaml::from_str(&text).map_err(|e| SegError::Config {
        path,
        reason: "malformed yaml".to_string(),
        source: Some(Box::new(e)),
    })
}

fn validate_data(path: &Path, data: &DataConfig) -> Result<()> {
    if data.label_remap.is_empty() {
        return Err(SegError::config(path, "label_remap is empty"));
    }
    if let Some(raw) = data
        .label_remap
        .keys()
        .find(|raw| !data.color_map.contains_key(raw))
    {
        return Err(SegError::config(
            path,
            format!("label {raw} has no color_map entry"),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const DATA: &str = "\
name: toy
label_map:
  0: background
  1: road
  2: car
label_remap:
  0: 0
  1: 1
  2: 2
color_map:
  0: [0, 0, 0]
  1: [128, 64, 128]
  2: [142, 0, 0]
";
    pub(crate) const NET: &str = "\
name: erfnet
img_prop:
  width: 64
  height: 32
  depth: 3
n_k_lyr: [16, 64, 128]
";
    pub(crate) const TRAIN: &str = "\
lr: 0.001
max_epochs: 100
";
    pub(crate) const NODES: &str = "\
input_node: test_model/model/images/Placeholder
code_node: test_model/model/encoder/output
mask_node: test_model/model/logits/ArgMax
";

    pub(crate) fn write_bundle(dir: &Path) {
        fs::write(dir.join(DATA_FILE), DATA).unwrap();
        fs::write(dir.join(NET_FILE), NET).unwrap();
        fs::write(dir.join(TRAIN_FILE), TRAIN).unwrap();
        fs::write(dir.join(NODES_FILE), NODES).unwrap();
    }

    #[test]
    fn test_load_complete_bundle() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path());

        let bundle = ModelBundle::load(temp_dir.path())?;
        assert_eq!(bundle.data.label_remap.len(), 3);
        assert_eq!(bundle.data.color_map[&1], [128, 64, 128]);
        assert_eq!(
            bundle.net.img_prop,
            ImgProp {
                width: 64,
                height: 32,
                depth: 3
            }
        );
        assert!(bundle.net.extra.contains_key("n_k_lyr"));
        assert!(bundle.train.0.contains_key("lr"));
        assert_eq!(bundle.nodes.mask_node, "test_model/model/logits/ArgMax");
        Ok(())
    }

    #[test]
    fn test_each_missing_file_is_config_error() {
        for missing in [DATA_FILE, NET_FILE, TRAIN_FILE, NODES_FILE] {
            let temp_dir = TempDir::new().unwrap();
            write_bundle(temp_dir.path());
            fs::remove_file(temp_dir.path().join(missing)).unwrap();

            match ModelBundle::load(temp_dir.path()) {
                Err(SegError::Config { path, .. }) => {
                    assert_eq!(path, temp_dir.path().join(missing))
                }
                other => panic!("expected config error for {missing}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_malformed_yaml() {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path());
        fs::write(temp_dir.path().join(NODES_FILE), "input_node: [unclosed").unwrap();

        let err = ModelBundle::load(temp_dir.path()).unwrap_err();
        assert!(matches!(err, SegError::Config { ref reason, .. } if reason == "malformed yaml"));
    }

    #[test]
    fn test_missing_node_key() {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path());
        fs::write(temp_dir.path().join(NODES_FILE), "input_node: a\nmask_node: b\n").unwrap();

        assert!(matches!(
            ModelBundle::load(temp_dir.path()),
            Err(SegError::Config { .. })
        ));
    }

    #[test]
    fn test_label_without_color() {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path());
        fs::write(
            temp_dir.path().join(DATA_FILE),
            "label_remap: {0: 0, 7: 1}\ncolor_map: {0: [0, 0, 0]}\n",
        )
        .unwrap();

        let err = ModelBundle::load(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("label 7 has no color_map entry"));
    }

    #[test]
    fn test_grayscale_net_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path());
        fs::write(
            temp_dir.path().join(NET_FILE),
            "img_prop: {width: 8, height: 8, depth: 1}\n",
        )
        .unwrap();

        assert!(matches!(
            ModelBundle::load(temp_dir.path()),
            Err(SegError::Config { .. })
        ));
    }

    #[test]
    fn test_graph_path() -> Result<()> {
        let temp_dir = TempDir::new().unwrap();
        write_bundle(temp_dir.path());
        let bundle = ModelBundle::load(temp_dir.path())?;

        assert!(matches!(
            bundle.graph_path(ModelVariant::Optimized),
            Err(SegError::ModelNotFound { .. })
        ));

        fs::write(temp_dir.path().join("optimized.pb"), b"graph").unwrap();
        assert_eq!(
            bundle.graph_path(ModelVariant::Optimized)?,
            temp_dir.path().join("optimized.pb")
        );
        Ok(())
    }
}
