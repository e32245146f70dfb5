use std::path::Path;
use std::time::Instant;

use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Array2;
use tract_tensorflow::prelude::*;
use tract_tensorflow::tract_hir::infer::{Factoid, ShapeFactoid};
use tracing::{debug, info};

use crate::{
    bundle::ModelBundle,
    errors::{Result, SegError},
    mask::Mask,
    traits::{Segmentation, SegmentationModel},
};

mod tf_ops;

/// Engine setup decided once at startup and handed to [`FrozenGraph::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Run the full optimizer (op fusion, kernel selection) instead of only decluttering.
    pub optimize: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// A tensor name as written in `nodes.yaml`: `scope/op` or `scope/op:slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub name: String,
    pub slot: usize,
}

impl NodeRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.rsplit_once(':') {
            Some((name, slot)) => match slot.parse() {
                Ok(slot) => Self {
                    name: name.to_string(),
                    slot,
                },
                Err(_) => Self {
                    name: raw.to_string(),
                    slot: 0,
                },
            },
            None => Self {
                name: raw.to_string(),
                slot: 0,
            },
        }
    }
}

/// Graph outlets bound from `nodes.yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundNodes {
    pub input: OutletId,
    pub code: OutletId,
    pub mask: OutletId,
}

/// A frozen TensorFlow graph planned for repeated single-frame execution.
pub struct FrozenGraph {
    plan: TypedRunnableModel<TypedModel>,
    input_width: u32,
    input_height: u32,
}

impl FrozenGraph {
    /// Parse the graph, bind the nodes named in the bundle and plan it for frames of
    /// `frame_size` (width, height).
    ///
    /// Graphs whose input placeholder declares a fixed height and width are planned at that
    /// size instead; frames are then resized on the way in and masks on the way out.
    pub fn load(
        graph_path: &Path,
        bundle: &ModelBundle,
        frame_size: (u32, u32),
        options: EngineOptions,
    ) -> Result<Self> {
        let graph_err = |operation: &'static str| {
            move |e: TractError| SegError::GraphLoad {
                path: graph_path.to_path_buf(),
                operation: operation.to_string(),
                source: e.into(),
            }
        };

        let mut framework = tract_tensorflow::tensorflow();
        tf_ops::register(&mut framework.op_register);
        let mut model = framework
            .model_for_path(graph_path)
            .map_err(graph_err("GraphDef parsing"))?;

        let nodes = BoundNodes {
            input: resolve(&model, "input", &bundle.nodes.input_node)?,
            code: resolve(&model, "code", &bundle.nodes.code_node)?,
            mask: resolve(&model, "mask", &bundle.nodes.mask_node)?,
        };
        debug!(?nodes, "Resolved graph nodes");

        let declared = model
            .outlet_fact(nodes.input)
            .map_err(graph_err("input lookup"))?
            .shape
            .clone();
        let (width, height) = match (declared_dim(&declared, 2), declared_dim(&declared, 1)) {
            (Some(width), Some(height)) => {
                info!(width, height, "Graph input has a fixed size; frames will be resized");
                (width, height)
            }
            _ => frame_size,
        };

        model
            .set_input_outlets(&[nodes.input])
            .map_err(graph_err("input binding"))?;
        model
            .set_output_outlets(&[nodes.mask])
            .map_err(graph_err("output binding"))?;
        model
            .set_input_fact(0, u8::fact([1, height as usize, width as usize, 3]).into())
            .map_err(graph_err("input shape"))?;

        let typed = model.into_typed().map_err(graph_err("type inference"))?;
        let typed = if options.optimize {
            typed.into_optimized().map_err(graph_err("optimization"))?
        } else {
            typed.into_decluttered().map_err(graph_err("decluttering"))?
        };
        let plan = typed.into_runnable().map_err(graph_err("planning"))?;

        info!(
            width,
            height,
            optimized = options.optimize,
            "Loaded frozen graph from {}",
            graph_path.display()
        );

        Ok(Self {
            plan,
            input_width: width,
            input_height: height,
        })
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.input_width, self.input_height)
    }

    fn to_tensor(&self, frame: &RgbImage) -> Result<Tensor> {
        let resized;
        let frame = if frame.dimensions() == self.input_size() {
            frame
        } else {
            resized = imageops::resize(
                frame,
                self.input_width,
                self.input_height,
                FilterType::Triangle,
            );
            &resized
        };

        let shape = [
            1,
            self.input_height as usize,
            self.input_width as usize,
            3,
        ];
        Tensor::from_shape(&shape, frame.as_raw().as_slice())
            .map_err(inference_err("input tensor"))
    }
}

impl SegmentationModel for FrozenGraph {
    fn segment(&self, frame: &RgbImage) -> Result<Segmentation> {
        let input = self.to_tensor(frame)?;

        let start = Instant::now();
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(inference_err("graph execution"))?;
        let elapsed = start.elapsed();

        let output = outputs
            .first()
            .ok_or_else(|| SegError::Inference {
                operation: "graph execution".to_string(),
                source: "graph produced no outputs".into(),
            })?
            .cast_to::<i64>()
            .map_err(inference_err("mask cast"))?;
        let mut mask = mask_from_tensor(&output)?;

        let (width, height) = frame.dimensions();
        if mask.dimensions() != (width, height) {
            mask = mask.resize_nearest(width, height);
        }
        Ok(Segmentation { mask, elapsed })
    }
}

/// Height or width the placeholder fixes, if any.
fn declared_dim(shape: &ShapeFactoid, axis: usize) -> Option<u32> {
    let dim = shape.dim(axis)?.concretize()?;
    u32::try_from(dim.to_i64().ok()?).ok()
}

/// `[H, W]`, `[1, H, W]` or `[1, H, W, 1]` integer output into a mask.
fn mask_from_tensor(tensor: &Tensor) -> Result<Mask> {
    let mut shape = tensor.shape().to_vec();
    if shape.len() == 4 && shape[3] == 1 {
        shape.pop();
    }
    let (height, width) = match shape.as_slice() {
        [h, w] | [1, h, w] => (*h, *w),
        _ => {
            return Err(SegError::Inference {
                operation: "mask shape".to_string(),
                source: format!("unexpected mask shape {:?}", tensor.shape()).into(),
            })
        }
    };

    let values = tensor
        .as_slice::<i64>()
        .map_err(inference_err("mask read"))?
        .iter()
        .map(|&v| v.max(0) as u32)
        .collect();
    let classes =
        Array2::from_shape_vec((height, width), values).map_err(|e| SegError::Inference {
            operation: "mask shape".to_string(),
            source: Box::new(e),
        })?;
    Ok(Mask::new(classes))
}

fn resolve(model: &InferenceModel, role: &'static str, raw: &str) -> Result<OutletId> {
    let node = NodeRef::parse(raw);
    let id = model
        .node_id_by_name(&node.name)
        .map_err(|e| SegError::NodeResolution {
            role,
            name: raw.to_string(),
            source: Some(e.into()),
        })?;

    if node.slot >= model.node(id).outputs.len() {
        return Err(SegError::NodeResolution {
            role,
            name: raw.to_string(),
            source: Some(
                format!(
                    "node has {} outputs, slot {} requested",
                    model.node(id).outputs.len(),
                    node.slot
                )
                .into(),
            ),
        });
    }

    Ok(OutletId::new(id, node.slot))
}

fn inference_err(operation: &'static str) -> impl Fn(TractError) -> SegError {
    move |e| SegError::Inference {
        operation: operation.to_string(),
        source: e.into(),
    }
}
