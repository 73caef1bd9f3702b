//! Configuration and mesh input/output.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Error, Material, SimParams, TetMesh};

/// A complete simulation configuration as stored on disk.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub sim_params: SimParams,
    pub material: Material,
}

/// Deserialize a RON or JSON file, chosen by the file extension. Files without a `json`
/// extension are read as RON.
fn load_config_file<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let f = BufReader::new(File::open(path)?);
    let is_json = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        Ok(serde_json::from_reader(f)?)
    } else {
        Ok(ron::de::from_reader(f)?)
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<SceneConfig, Error> {
    load_config_file(path.as_ref())
}

pub fn load_params(path: impl AsRef<Path>) -> Result<SimParams, Error> {
    load_config_file(path.as_ref())
}

pub fn load_material(path: impl AsRef<Path>) -> Result<Material, Error> {
    load_config_file(path.as_ref())
}

/// Write a configuration as RON or JSON, chosen by the file extension.
pub fn save_config(config: &SceneConfig, path: impl AsRef<Path>) -> Result<(), Error> {
    let path = path.as_ref();
    let s = if path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
    {
        serde_json::to_string_pretty(config)?
    } else {
        ron::ser::to_string_pretty(config, ron::ser::PrettyConfig::default()).map_err(|err| {
            Error::ConfigParse {
                reason: err.to_string(),
            }
        })?
    };
    std::fs::write(path, s)?;
    Ok(())
}

/// Non-empty, non-comment lines of a TetGen file together with their 1-based line numbers.
fn data_lines(path: &Path) -> Result<Vec<(usize, Vec<String>)>, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let content = line.split('#').next().unwrap_or("");
        let tokens: Vec<String> = content.split_whitespace().map(String::from).collect();
        if !tokens.is_empty() {
            lines.push((i + 1, tokens));
        }
    }
    Ok(lines)
}

fn parse_token<T: std::str::FromStr>(token: &str, line: usize) -> Result<T, Error> {
    token.parse().map_err(|_| Error::MeshParse {
        line,
        reason: format!("unexpected token {:?}", token),
    })
}

/// Records of a TetGen file following its header. The record count is read from the header and
/// each record must have at least `min_len` fields.
fn records(
    lines: &[(usize, Vec<String>)],
    min_len: usize,
) -> Result<&[(usize, Vec<String>)], Error> {
    let (header_line, header) = lines.first().ok_or_else(|| Error::MeshParse {
        line: 0,
        reason: "missing header".to_string(),
    })?;
    let count: usize = parse_token(&header[0], *header_line)?;
    let body = &lines[1..];
    if body.len() < count {
        return Err(Error::MeshParse {
            line: body.last().map_or(*header_line, |(l, _)| *l),
            reason: format!("expected {} records, found {}", count, body.len()),
        });
    }
    let body = &body[..count];
    if let Some((line, _)) = body.iter().find(|(_, tokens)| tokens.len() < min_len) {
        return Err(Error::MeshParse {
            line: *line,
            reason: format!("expected at least {} fields", min_len),
        });
    }
    Ok(body)
}

/// Load a tetrahedral mesh from a TetGen `.node` file and the `.ele` file next to it.
///
/// Node ids may start at 0 or 1; the base is taken from the first node record. Attribute and
/// boundary marker columns are ignored, as are the extra nodes of quadratic elements.
pub fn load_tetgen(node_path: impl AsRef<Path>) -> Result<TetMesh, Error> {
    let node_path = node_path.as_ref();
    let ele_path: PathBuf = node_path.with_extension("ele");

    let node_lines = data_lines(node_path)?;
    let nodes = records(&node_lines, 4)?;
    let base = match nodes.first() {
        Some((line, tokens)) => parse_token::<usize>(&tokens[0], *line)?,
        None => 0,
    };
    if base > 1 {
        return Err(Error::MeshParse {
            line: nodes[0].0,
            reason: format!("node ids must start at 0 or 1, found {}", base),
        });
    }

    let positions = nodes
        .iter()
        .map(|(line, tokens)| {
            Ok([
                parse_token(&tokens[1], *line)?,
                parse_token(&tokens[2], *line)?,
                parse_token(&tokens[3], *line)?,
            ])
        })
        .collect::<Result<Vec<[f64; 3]>, Error>>()?;

    let ele_lines = data_lines(&ele_path)?;
    let eles = records(&ele_lines, 5)?;
    let cells = eles
        .iter()
        .map(|(line, tokens)| {
            let mut cell = [0; 4];
            for (c, token) in cell.iter_mut().zip(tokens[1..5].iter()) {
                let id: usize = parse_token(token, *line)?;
                *c = id.checked_sub(base).ok_or_else(|| Error::MeshParse {
                    line: *line,
                    reason: format!("node id {} is below the base index {}", id, base),
                })?;
            }
            Ok(cell)
        })
        .collect::<Result<Vec<[usize; 4]>, Error>>()?;

    log::info!(
        "Loaded {} vertices and {} tetrahedra from {}",
        positions.len(),
        cells.len(),
        node_path.display()
    );

    TetMesh::new(positions, cells)
}

/// Write the boundary surface of the mesh at its current positions as a Wavefront OBJ file.
pub fn save_surface_obj(mesh: &TetMesh, path: impl AsRef<Path>) -> Result<(), Error> {
    let mut w = BufWriter::new(File::create(path.as_ref())?);
    for p in mesh.vertex_positions() {
        writeln!(w, "v {} {} {}", p[0], p[1], p[2])?;
    }
    for face in mesh.boundary_faces() {
        writeln!(w, "f {} {} {}", face[0] + 1, face[1] + 1, face[2] + 1)?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::Integrator;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("corofem_{}_{}", std::process::id(), name))
    }

    #[test]
    fn config_round_trip() -> Result<(), Error> {
        let config = SceneConfig {
            sim_params: SimParams::implicit(),
            material: IMPLICIT_MATERIAL,
        };
        for ext in ["ron", "json"] {
            let path = temp_path(&format!("config.{}", ext));
            save_config(&config, &path)?;
            let loaded = load_config(&path)?;
            std::fs::remove_file(&path)?;
            assert_eq!(loaded, config);
        }
        Ok(())
    }

    #[test]
    fn load_ron_params() -> Result<(), Error> {
        let path = temp_path("params.ron");
        std::fs::write(
            &path,
            "(
                time_step: 0.01,
                gravity: (0.0, -9.8, 0.0),
                integrator: Implicit(max_iterations: 20, tolerance: 1e-8),
                bounds: None,
                volume_normalization: Some(1000.0),
            )",
        )?;
        let params = load_params(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(params.time_step, 0.01);
        assert_eq!(
            params.integrator,
            Integrator::Implicit {
                max_iterations: 20,
                tolerance: 1e-8
            }
        );
        assert_eq!(params.volume_normalization, Some(1000.0));
        Ok(())
    }

    #[test]
    fn malformed_config_is_reported() {
        let path = temp_path("bad.json");
        std::fs::write(&path, "{ \"young_modulus\": ").unwrap();
        let result = load_material(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn load_one_based_tetgen() -> Result<(), Error> {
        let node = temp_path("one_based.node");
        std::fs::write(
            &node,
            "# unit tet\n4 3 0 1\n1 0 0 0 1\n2 1 0 0 1\n3 0 1 0 1\n4 0 0 1 1\n",
        )?;
        std::fs::write(node.with_extension("ele"), "1 4 0\n1 1 2 3 4 # only cell\n")?;
        let mesh = load_tetgen(&node)?;
        std::fs::remove_file(node.with_extension("ele"))?;
        std::fs::remove_file(&node)?;

        assert_eq!(mesh, make_one_tet_mesh());
        Ok(())
    }

    #[test]
    fn load_zero_based_tetgen() -> Result<(), Error> {
        let node = temp_path("zero_based.node");
        let verts = make_three_tet_mesh();
        let mut s = format!("{} 3 0 0\n", verts.num_vertices());
        for (i, p) in verts.vertex_positions().iter().enumerate() {
            s.push_str(&format!("{} {} {} {}\n", i, p[0], p[1], p[2]));
        }
        std::fs::write(&node, s)?;
        let mut s = format!("{} 4 0\n", verts.num_cells());
        for (i, c) in verts.cells().iter().enumerate() {
            s.push_str(&format!("{} {} {} {} {}\n", i, c[0], c[1], c[2], c[3]));
        }
        std::fs::write(node.with_extension("ele"), s)?;
        let mesh = load_tetgen(&node)?;
        std::fs::remove_file(node.with_extension("ele"))?;
        std::fs::remove_file(&node)?;

        assert_eq!(mesh, verts);
        Ok(())
    }

    #[test]
    fn unused_tetgen_node_is_rejected() {
        let node = temp_path("unused_node.node");
        std::fs::write(
            &node,
            "5 3 0 0\n0 0 0 0\n1 1 0 0\n2 0 1 0\n3 0 0 1\n4 0 0.05 0\n",
        )
        .unwrap();
        std::fs::write(node.with_extension("ele"), "1 4 0\n0 0 1 2 3\n").unwrap();
        let result = load_tetgen(&node);
        std::fs::remove_file(node.with_extension("ele")).unwrap();
        std::fs::remove_file(&node).unwrap();
        assert!(matches!(result, Err(Error::IsolatedVertex { vertex: 4 })));
    }

    #[test]
    fn truncated_tetgen_reports_line() {
        let node = temp_path("truncated.node");
        std::fs::write(&node, "3 3 0 0\n0 0 0 0\n1 1 0 x\n2 0 1 0\n").unwrap();
        std::fs::write(node.with_extension("ele"), "1 4 0\n0 0 1 2 3\n").unwrap();
        let result = load_tetgen(&node);
        std::fs::remove_file(node.with_extension("ele")).unwrap();
        std::fs::remove_file(&node).unwrap();
        match result {
            Err(Error::MeshParse { line: 3, .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn obj_lists_boundary_faces() -> Result<(), Error> {
        let path = temp_path("surface.obj");
        let mesh = make_three_tet_mesh();
        save_surface_obj(&mesh, &path)?;
        let contents = std::fs::read_to_string(&path)?;
        std::fs::remove_file(&path)?;
        assert_eq!(contents.lines().filter(|l| l.starts_with("v ")).count(), 6);
        assert_eq!(contents.lines().filter(|l| l.starts_with("f ")).count(), 8);
        Ok(())
    }
}
