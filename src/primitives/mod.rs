//! The seven surface primitives (`mk`/`rm`/`ls`/`cat`/`add.item`/`cp`/`mv`)
//! across the three stores.

pub mod surface;
