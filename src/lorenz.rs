/// Lorenz system integration
/// Forward-Euler stepping of the classic three-variable convection model

use serde::{Deserialize, Serialize};

/// Lorenz parameters (σ, ρ, β) and the integration step dt.
/// Chaotic regime at σ=10, ρ=28, β=8/3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LorenzParams {
    pub sigma: f64,
    pub rho: f64,
    pub beta: f64,
    pub dt: f64,
}

impl Default for LorenzParams {
    fn default() -> Self {
        LorenzParams {
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
            dt: 0.01,
        }
    }
}

/// The simulated particle. `age` counts integration steps taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub age: u64,
}

impl TrajectoryPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        TrajectoryPoint { x, y, z, age: 0 }
    }

    /// Fixed starting state (0.1, 0.1, 0.1)
    pub fn seed() -> Self {
        TrajectoryPoint::new(0.1, 0.1, 0.1)
    }

    pub fn from_array(xyz: [f64; 3]) -> Self {
        TrajectoryPoint::new(xyz[0], xyz[1], xyz[2])
    }
}

/// Right-hand side of the Lorenz equations
/// dx/dt = σ(y - x)
/// dy/dt = x(ρ - z) - y
/// dz/dt = xy - βz
pub fn derivatives(point: &TrajectoryPoint, params: &LorenzParams) -> (f64, f64, f64) {
    let dx = params.sigma * (point.y - point.x);
    let dy = point.x * (params.rho - point.z) - point.y;
    let dz = point.x * point.y - params.beta * point.z;
    (dx, dy, dz)
}

/// Advance the point by one explicit Euler step.
/// The state is not bounded here; only the screen projection is clamped.
pub fn euler_step(point: &mut TrajectoryPoint, params: &LorenzParams) {
    point.age += 1;

    let (dx, dy, dz) = derivatives(point, params);
    point.x += dx * params.dt;
    point.y += dy * params.dt;
    point.z += dz * params.dt;
}

/// Iterator over successive states, starting after the first step.
pub fn trajectory(
    seed: TrajectoryPoint,
    params: LorenzParams,
) -> impl Iterator<Item = TrajectoryPoint> {
    let mut point = seed;
    std::iter::repeat_with(move || {
        euler_step(&mut point, &params);
        point
    })
}
