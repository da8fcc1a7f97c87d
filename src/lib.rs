// Scroll-driven procedural catheter journey: vessel surfaces from centerlines,
// a phased clot-removal sequence and blood flow that reacts to it.

pub mod engine;
