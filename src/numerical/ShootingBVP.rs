
pub mod BC_jacobian;
pub mod MultipleShooting_solver;
pub mod STM_dynamics;
pub mod Shooting_api;
mod Shooting_utils;
pub mod SingleShooting_solver;
pub mod boundary_residual;
pub mod shooting_problem;
