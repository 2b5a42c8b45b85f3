//! Storefront domain: cart engine, order assembler and the catalog read model.
pub mod aggregates;
pub mod delivery;
pub mod events;
pub mod value_objects;
