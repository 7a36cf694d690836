//! # lqnash Core
//!
//! Core library for finite-horizon, multi-player, general-sum differential
//! games: multi-player dynamics (nonlinear and feedback-linearizable),
//! per-player costs built from small composable terms, planar geometry for
//! lane-based costs, and the trajectory types shared with the solver stack.
//!
//! ## Modules
//!
//! - [`math`]: small numerical utilities (symmetrization, PSD probes)
//! - [`dynamics`]: multi-player dynamics and concrete vehicle models
//! - [`cost`]: cost abstraction and the cost-term library
//! - [`geometry`]: line segments and polylines
//! - [`trajectory`]: operating points
//! - [`strategy`]: affine feedback strategies

pub mod cost;
pub mod dynamics;
pub mod geometry;
pub mod math;
pub mod strategy;
pub mod trajectory;

use nalgebra::{DMatrix, DVector, Vector2};

/// Dense dynamic matrix type used throughout the solver stack.
pub type MatX = DMatrix<f64>;

/// Dense dynamic vector type used throughout the solver stack.
pub type VecX = DVector<f64>;

/// Planar point/vector type for geometry and lane-based costs.
pub type Point2 = Vector2<f64>;

/// Index of a player within a multi-player system.
pub type PlayerIndex = usize;

/// Index of a state or control dimension.
pub type Dimension = usize;
