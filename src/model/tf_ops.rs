//! TensorFlow ops missing from tract's importer.

use tract_tensorflow::model::{ParsingContext, TfOpRegister};
use tract_tensorflow::tfpb::tensorflow::NodeDef;
use tract_tensorflow::tract_hir::internal::*;
use tract_tensorflow::tract_hir::ops::nn;

pub fn register(reg: &mut TfOpRegister) {
    reg.insert("ArgMax", arg_max);
}

fn arg_max(_ctx: &ParsingContext, pb: &NodeDef) -> TractResult<Box<dyn InferenceOp>> {
    let output_type = pb
        .get_attr_opt_datum_type("output_type")?
        .unwrap_or(DatumType::I64);
    Ok(expand(ArgMax { output_type }))
}

/// `tf.math.argmax`: index of the largest value along the axis given by the second input,
/// first occurrence on ties. The reduced axis is dropped.
#[derive(Debug, Clone, Hash)]
pub struct ArgMax {
    output_type: DatumType,
}

impl Expansion for ArgMax {
    fn name(&self) -> Cow<str> {
        "ArgMax".into()
    }

    fn rules<'r, 'p: 'r, 's: 'r>(
        &'s self,
        s: &mut Solver<'r>,
        inputs: &'p [TensorProxy],
        outputs: &'p [TensorProxy],
    ) -> InferenceResult {
        check_input_arity(inputs, 2)?;
        check_output_arity(outputs, 1)?;
        s.equals(&outputs[0].datum_type, self.output_type)?;
        s.equals(inputs[0].rank.bex() - 1, &outputs[0].rank)?;
        s.given_2(&inputs[0].rank, &inputs[1].value, move |s, rank, axis| {
            let axis = resolve_axis(axis.cast_to_scalar::<i64>()?, rank)?;
            for (out_ix, in_ix) in (0..rank as usize).filter(|&ix| ix != axis).enumerate() {
                s.equals(&outputs[0].shape[out_ix], &inputs[0].shape[in_ix])?;
            }
            Ok(())
        })
    }

    fn wire(
        &self,
        prefix: &str,
        target: &mut TypedModel,
        inputs: &[OutletId],
    ) -> TractResult<TVec<OutletId>> {
        let axis = match target.outlet_fact(inputs[1])?.konst {
            Some(ref axis) => axis.cast_to_scalar::<i64>()?,
            None => bail!("ArgMax needs a constant axis"),
        };
        let reduce = nn::Reduce {
            axes: Some(vec![axis]),
            keep_dims: false,
            reducer: nn::Reducer::ArgMax(false),
        };
        let mut wires = reduce.wire(prefix, target, &inputs[..1])?;

        if self.output_type != DatumType::I64 {
            wires = target.wire_node(
                format!("{prefix}.cast"),
                tract_core::ops::cast::cast(self.output_type),
                &wires,
            )?;
        }
        Ok(wires)
    }
}

fn resolve_axis(axis: i64, rank: i64) -> TractResult<usize> {
    let resolved = if axis < 0 { axis + rank } else { axis };
    if (0..rank).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        bail!("ArgMax axis {axis} is out of range for rank {rank}")
    }
}
