//! Basketball play-by-play recaps.
//!
//! Segments an ordered play list into small narratable moments, checks
//! them against a fixed set of invariants, renders a narrative per moment
//! (from a text generator when one is attached, from sentence templates
//! otherwise), forces every must-mention play into the text, and groups
//! the result into a short arc of chapters. An optional guardrail layer
//! lets a generator polish the wording but discards anything that changes
//! a fact.
//!
//! Entry point: [`core::pipeline::RecapPipeline`].

pub mod core;
pub mod schema;
pub mod testing;
