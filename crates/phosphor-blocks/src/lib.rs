//! Reference block library for the Phosphor dataflow engine.
//!
//! Every definition here is pure metadata over the closed behavior
//! vocabulary: ports, defaults, state declarations, and a behavior tag.
//! [`standard_registry`] assembles the registry used by the engine's
//! tests, benches, and demo patches; applications can extend it or build
//! their own.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod fields;
pub mod render;
pub mod signals;

use phosphor_graph::BlockRegistry;

/// The standard registry: signal math, time roots, field operators,
/// reducers, state, and render sinks.
pub fn standard_registry() -> BlockRegistry {
    let mut reg = BlockRegistry::new();
    signals::register(&mut reg);
    fields::register(&mut reg);
    render::register(&mut reg);
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_is_populated() {
        let reg = standard_registry();
        for kind in [
            "Const",
            "InfiniteTimeRoot",
            "Add",
            "UnitDelay",
            "Array",
            "FieldBroadcast",
            "FieldGoldenAngle",
            "FieldPolarToCartesian",
            "RenderInstances2D",
            "Bus",
        ] {
            assert!(reg.get(kind).is_some(), "missing {kind}");
        }
    }

    #[test]
    fn every_input_port_type_is_well_formed() {
        let reg = standard_registry();
        for def in reg.iter() {
            for port in def.inputs.iter().chain(def.outputs.iter()) {
                // Object payloads are static-only; everything else must
                // be bufferable.
                if port.ty.payload.is_bufferable() {
                    assert!(port.ty.payload.components() >= 1);
                } else {
                    assert_eq!(
                        port.ty.cardinality,
                        phosphor_core::ty::Cardinality::Static,
                        "{}.{} carries an object payload outside static",
                        def.kind,
                        port.id
                    );
                }
            }
        }
    }
}
