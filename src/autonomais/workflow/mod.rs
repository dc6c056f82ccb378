// SPDX-License-Identifier: MIT

pub mod checkpoint;
pub mod graph;
pub mod loader;
pub mod node;
pub mod registry;
pub mod runner;
pub mod state;
