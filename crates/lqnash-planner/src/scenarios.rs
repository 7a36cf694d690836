//! Example scenarios
//!
//! Ready-made problems used by the integration tests and as usage
//! references: a four-car roundabout merge on feedback-linearizable
//! dynamics, and a two-vehicle overtaking encounter on nonlinear unicycle
//! dynamics. Also home to the route helpers (lane generation and
//! constant-speed operating-point initialization).

use std::sync::Arc;

use lqnash_core::cost::{
    PlayerCost, ProximityCost, QuadraticCost, QuadraticPolylineCost, RouteProgressCost,
    SemiquadraticPolylineCost,
};
use lqnash_core::dynamics::{
    ConcatenatedDynamics, ConcatenatedFlatSystem, Dynamics, FlatCar6D,
    FlatSinglePlayerDynamics, SinglePlayerDynamics, Unicycle4D,
};
use lqnash_core::geometry::Polyline2;
use lqnash_core::trajectory::OperatingPoint;
use lqnash_core::{Dimension, Point2, VecX};

use crate::params::SolverParams;
use crate::problem::Problem;

// Shared timing.
const TIME_STEP: f64 = 0.1; // s
const TIME_HORIZON: f64 = 10.0; // s

// Roundabout geometry.
const ROUNDABOUT_RADIUS: f64 = 10.0; // m
const LANE_POINT_SPACING: f64 = 2.0; // m
const ARC_ANGLE_SPACING: f64 = 0.25; // rad

// Roundabout cost weights, per player where they differ.
const LANE_COST_WEIGHT: f64 = 25.0;
const LANE_BOUNDARY_COST_WEIGHT: f64 = 100.0;
const NOMINAL_V_COST_WEIGHT: f64 = 10.0;
const AUX_COST_WEIGHT: f64 = 4.0;
const PROXIMITY_COST_WEIGHT: f64 = 100.0;
const MIN_PROXIMITY: f64 = 6.0; // m
const LANE_HALF_WIDTH: f64 = 2.5; // m
const NOMINAL_V: f64 = 10.0; // m/s
const INTER_AXLE_DISTANCE: f64 = 4.0; // m

const INITIAL_DISTANCES: [f64; 4] = [25.0, 10.0, 25.0, 10.0]; // m
const INITIAL_SPEEDS: [f64; 4] = [3.0, 2.0, 3.0, 2.0]; // m/s

/// Lane center for one roundabout entry: a radial approach from
/// `distance_from_entrance` meters out, then an arc from `entry_angle` to
/// `exit_angle` (counterclockwise) along the roundabout.
pub fn roundabout_lane_center(
    entry_angle: f64,
    exit_angle: f64,
    distance_from_entrance: f64,
) -> Vec<Point2> {
    let radial = Point2::new(entry_angle.cos(), entry_angle.sin());
    let mut points = Vec::new();

    let mut s = 0.0;
    while s < distance_from_entrance {
        points.push(radial * (ROUNDABOUT_RADIUS + distance_from_entrance - s));
        s += LANE_POINT_SPACING;
    }

    let mut angle = entry_angle;
    while angle < exit_angle {
        points.push(Point2::new(
            ROUNDABOUT_RADIUS * angle.cos(),
            ROUNDABOUT_RADIUS * angle.sin(),
        ));
        angle += ARC_ANGLE_SPACING;
    }
    points.push(Point2::new(
        ROUNDABOUT_RADIUS * exit_angle.cos(),
        ROUNDABOUT_RADIUS * exit_angle.sin(),
    ));

    points
}

/// Fill the position dimensions of an operating point by following a
/// route at constant speed from an initial arc length. Other dimensions
/// are left untouched.
pub fn initialize_along_route(
    route: &Polyline2,
    initial_arc_length: f64,
    speed: f64,
    dims: (Dimension, Dimension),
    op: &mut OperatingPoint,
) {
    for k in 0..op.horizon() {
        let s = initial_arc_length + speed * (k as f64) * op.time_step;
        let point = route.point_at(s);
        op.xs[k][dims.0] = point.x;
        op.xs[k][dims.1] = point.y;
    }
}

/// Four feedback-linearizable cars merging through a roundabout.
pub struct RoundaboutScenario {
    pub problem: Problem,
    /// Per-player lane centers.
    pub lanes: Vec<Arc<Polyline2>>,
    /// Per-player (x, y) indices into the joint state.
    pub position_dims: Vec<(Dimension, Dimension)>,
    pub initial_speeds: Vec<f64>,
    pub nominal_speed: f64,
    pub min_proximity: f64,
}

/// Build the roundabout problem: entries at `π/4 + i·π/2`, staggered
/// initial distances and speeds, lane-keeping plus route-progress plus
/// pairwise proximity costs, trust region on every position dimension.
pub fn roundabout(params: &SolverParams) -> RoundaboutScenario {
    let num_players = 4;
    let horizon = (TIME_HORIZON / TIME_STEP) as usize;
    let angle_offset = std::f64::consts::FRAC_PI_4;
    let wedge = std::f64::consts::PI;

    let cars: Vec<Arc<dyn FlatSinglePlayerDynamics>> = (0..num_players)
        .map(|_| Arc::new(FlatCar6D::new(INTER_AXLE_DISTANCE)) as Arc<dyn FlatSinglePlayerDynamics>)
        .collect();
    let dynamics = Arc::new(ConcatenatedFlatSystem::new(cars, TIME_STEP));

    let position_dims: Vec<(Dimension, Dimension)> = (0..num_players)
        .map(|i| {
            let offset = dynamics.x_offset(i);
            (offset + FlatCar6D::PX, offset + FlatCar6D::PY)
        })
        .collect();

    let lanes: Vec<Arc<Polyline2>> = (0..num_players)
        .map(|i| {
            let entry = angle_offset + i as f64 * std::f64::consts::FRAC_PI_2;
            Arc::new(Polyline2::new(&roundabout_lane_center(
                entry,
                entry + wedge,
                INITIAL_DISTANCES[i],
            )))
        })
        .collect();

    // Initial nonlinear state: each car at its lane start, heading along
    // the lane at its initial speed.
    let mut x0 = VecX::zeros(dynamics.x_dim());
    for i in 0..num_players {
        let offset = dynamics.x_offset(i);
        let start = lanes[i].point_at(0.0);
        x0[offset + FlatCar6D::PX] = start.x;
        x0[offset + FlatCar6D::PY] = start.y;
        x0[offset + FlatCar6D::THETA] = lanes[i].segments()[0].heading();
        x0[offset + FlatCar6D::V] = INITIAL_SPEEDS[i];
    }

    let mut player_costs = Vec::with_capacity(num_players);
    for i in 0..num_players {
        let mut cost = PlayerCost::new();
        let dims = position_dims[i];

        cost.add_state_cost(Arc::new(
            QuadraticPolylineCost::new(LANE_COST_WEIGHT, lanes[i].clone(), dims)
                .named("LaneCenter"),
        ));
        cost.add_state_cost(Arc::new(
            SemiquadraticPolylineCost::new(
                LANE_BOUNDARY_COST_WEIGHT,
                lanes[i].clone(),
                dims,
                LANE_HALF_WIDTH,
                true,
            )
            .named("LaneRightBoundary"),
        ));
        cost.add_state_cost(Arc::new(
            SemiquadraticPolylineCost::new(
                LANE_BOUNDARY_COST_WEIGHT,
                lanes[i].clone(),
                dims,
                -LANE_HALF_WIDTH,
                false,
            )
            .named("LaneLeftBoundary"),
        ));
        cost.add_state_cost(Arc::new(
            RouteProgressCost::new(NOMINAL_V_COST_WEIGHT, NOMINAL_V, lanes[i].clone(), dims, 0.0)
                .named("RouteProgress"),
        ));
        cost.add_control_cost(
            i,
            Arc::new(QuadraticCost::on_all_dimensions(AUX_COST_WEIGHT, 0.0).named("AuxInput")),
        );

        // Each car watches the neighbor ahead and behind around the circle.
        for &j in &[(i + 1) % num_players, (i + num_players - 1) % num_players] {
            cost.add_state_cost(Arc::new(
                ProximityCost::new(
                    PROXIMITY_COST_WEIGHT,
                    dims,
                    position_dims[j],
                    MIN_PROXIMITY,
                )
                .named("Proximity"),
            ));
        }

        player_costs.push(cost);
    }

    let mut revised = params.clone();
    revised.trust_region_dimensions = position_dims
        .iter()
        .flat_map(|&(x, y)| [x, y])
        .collect();

    let mut problem = Problem::new(
        dynamics.clone() as Arc<dyn Dynamics>,
        player_costs,
        x0,
        0.0,
        horizon,
        revised,
    )
    .expect("roundabout problem is well-formed");

    // Warm-start operating point: follow the lanes at the initial speeds.
    let mut op = OperatingPoint::zeros(
        horizon,
        dynamics.x_dim(),
        &dynamics.u_dims(),
        0.0,
        TIME_STEP,
    );
    for i in 0..num_players {
        initialize_along_route(&lanes[i], 0.0, INITIAL_SPEEDS[i], position_dims[i], &mut op);
    }
    let strategies = problem.strategies().to_vec();
    problem.overwrite_solution(op, strategies);

    RoundaboutScenario {
        problem,
        lanes,
        position_dims,
        initial_speeds: INITIAL_SPEEDS.to_vec(),
        nominal_speed: NOMINAL_V,
        min_proximity: MIN_PROXIMITY,
    }
}

// Overtaking constants.
const OVERTAKING_GAP: f64 = 20.0; // m
const OVERTAKING_SPEED: f64 = 10.0; // m/s
const FOLLOWER_NOMINAL_V: f64 = 14.0; // m/s
/// Hard safety distance the scenario is judged against.
const OVERTAKING_MIN_PROXIMITY: f64 = 3.0; // m
/// Penalty threshold, with a buffer above the safety distance since the
/// proximity term is a soft penalty.
const OVERTAKING_PROXIMITY_THRESHOLD: f64 = 4.5; // m
const OVERTAKING_PROXIMITY_WEIGHT: f64 = 100.0;
const OVERTAKING_CONTROL_WEIGHT: f64 = 1.0;
const SPEED_COST_WEIGHT: f64 = 10.0;
const FOLLOWER_LANE_WEIGHT: f64 = 1.0;
const OPPOSITE_LANE_OFFSET: f64 = 6.0; // m, room to the left for passing

/// Two unicycles on a straight road, the rear one incentivized to pass.
pub struct OvertakingScenario {
    pub problem: Problem,
    pub lane: Arc<Polyline2>,
    /// (x, y) indices per player; player 0 leads, player 1 follows.
    pub position_dims: Vec<(Dimension, Dimension)>,
    pub min_proximity: f64,
}

pub fn overtaking(params: &SolverParams) -> OvertakingScenario {
    let horizon = (TIME_HORIZON / TIME_STEP) as usize;

    let players: Vec<Arc<dyn SinglePlayerDynamics>> =
        vec![Arc::new(Unicycle4D), Arc::new(Unicycle4D)];
    let dynamics = Arc::new(ConcatenatedDynamics::new(players, TIME_STEP));

    let lane = Arc::new(Polyline2::new(&[
        Point2::new(-50.0, 0.0),
        Point2::new(400.0, 0.0),
    ]));

    let position_dims: Vec<(Dimension, Dimension)> = (0..2)
        .map(|i| {
            let offset = dynamics.x_offset(i);
            (offset + Unicycle4D::PX, offset + Unicycle4D::PY)
        })
        .collect();
    let v_dims: Vec<Dimension> = (0..2)
        .map(|i| dynamics.x_offset(i) + Unicycle4D::V)
        .collect();

    // Leader ahead at the shared speed, follower directly behind.
    let mut x0 = VecX::zeros(dynamics.x_dim());
    x0[position_dims[0].0] = OVERTAKING_GAP;
    x0[v_dims[0]] = OVERTAKING_SPEED;
    x0[position_dims[1].0] = 0.0;
    x0[v_dims[1]] = OVERTAKING_SPEED;

    let mut player_costs = Vec::with_capacity(2);
    for i in 0..2 {
        let mut cost = PlayerCost::new();
        let dims = position_dims[i];
        let leader = i == 0;

        let lane_weight = if leader {
            LANE_COST_WEIGHT
        } else {
            FOLLOWER_LANE_WEIGHT
        };
        cost.add_state_cost(Arc::new(
            QuadraticPolylineCost::new(lane_weight, lane.clone(), dims).named("LaneCenter"),
        ));
        cost.add_state_cost(Arc::new(
            SemiquadraticPolylineCost::new(
                LANE_BOUNDARY_COST_WEIGHT,
                lane.clone(),
                dims,
                LANE_HALF_WIDTH,
                true,
            )
            .named("LaneRightBoundary"),
        ));
        // The follower may borrow the opposite lane to pass.
        let left_offset = if leader {
            -LANE_HALF_WIDTH
        } else {
            -OPPOSITE_LANE_OFFSET
        };
        cost.add_state_cost(Arc::new(
            SemiquadraticPolylineCost::new(
                LANE_BOUNDARY_COST_WEIGHT,
                lane.clone(),
                dims,
                left_offset,
                false,
            )
            .named("LaneLeftBoundary"),
        ));

        let nominal = if leader {
            OVERTAKING_SPEED
        } else {
            FOLLOWER_NOMINAL_V
        };
        cost.add_state_cost(Arc::new(
            QuadraticCost::on_dimension(SPEED_COST_WEIGHT, v_dims[i], nominal).named("NominalV"),
        ));

        cost.add_state_cost(Arc::new(
            ProximityCost::new(
                OVERTAKING_PROXIMITY_WEIGHT,
                dims,
                position_dims[1 - i],
                OVERTAKING_PROXIMITY_THRESHOLD,
            )
            .named("Proximity"),
        ));

        cost.add_control_cost(
            i,
            Arc::new(
                QuadraticCost::on_all_dimensions(OVERTAKING_CONTROL_WEIGHT, 0.0).named("Control"),
            ),
        );

        player_costs.push(cost);
    }

    let mut problem = Problem::new(
        dynamics.clone() as Arc<dyn Dynamics>,
        player_costs,
        x0.clone(),
        0.0,
        horizon,
        params.clone(),
    )
    .expect("overtaking problem is well-formed");

    let mut op = OperatingPoint::zeros(
        horizon,
        dynamics.x_dim(),
        &dynamics.u_dims(),
        0.0,
        TIME_STEP,
    );
    for i in 0..2 {
        initialize_along_route(
            &lane,
            50.0 + x0[position_dims[i].0],
            OVERTAKING_SPEED,
            position_dims[i],
            &mut op,
        );
    }
    let strategies = problem.strategies().to_vec();
    problem.overwrite_solution(op, strategies);

    OvertakingScenario {
        problem,
        lane,
        position_dims,
        min_proximity: OVERTAKING_MIN_PROXIMITY,
    }
}
