pub use corofem::test_utils::*;
use corofem::TetMesh;

/// Utility function to compare positions of two meshes.
#[allow(dead_code)]
pub fn compare_meshes(solution: &TetMesh, expected: &TetMesh, tol: f64) {
    use approx::*;
    for (pos, expected_pos) in solution
        .vertex_positions()
        .iter()
        .zip(expected.vertex_positions().iter())
    {
        assert_relative_eq!(pos[0], expected_pos[0], max_relative = tol, epsilon = 1e-12);
        assert_relative_eq!(pos[1], expected_pos[1], max_relative = tol, epsilon = 1e-12);
        assert_relative_eq!(pos[2], expected_pos[2], max_relative = tol, epsilon = 1e-12);
    }
}

#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::Builder::from_env("COROFEM_LOG")
        .is_test(true)
        .try_init();
}
