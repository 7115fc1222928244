//! Boundary condition patcher: rewrites the boundary text file like the
//! hierarchy patcher does, then regenerates the boundary array container
//! from scratch rather than patching it in place.

use {
    anyhow::{bail, ensure, Result},
    log::debug,
    std::fs,
};

use crate::{
    constants::TRACER_TYPE_BASE,
    container::{Attribute, Container, Dataset},
    parameters::Parameters,
    patch::{classify, value_token, Line},
    swap::SwapFile,
};

pub fn patch(params: &Parameters) -> Result<()> {
    // Check preconditions on both companion files before either is touched.
    let text_swap = SwapFile::begin(params.boundary_file())?;
    let array_swap = SwapFile::begin(params.boundary_array_file())?;

    let input = fs::read_to_string(text_swap.original())?;
    let (output, edge) = rewrite(&input, params)?;

    let total_fields = params.tracer.original_fields + params.tracer.new_fields;
    fs::write(text_swap.scratch(), output)?;
    regenerate(edge, total_fields).write(array_swap.scratch())?;

    text_swap.commit()?;
    array_swap.commit()
}

/// Pure rewrite of the boundary text file. Returns the rewritten text and
/// the boundary cube's edge length, which sizes the regenerated arrays.
pub fn rewrite(input: &str, params: &Parameters) -> Result<(String, usize)> {
    let new_fields = params.tracer.new_fields;
    let mut edge = None;
    let mut out = String::with_capacity(input.len() + 256);

    for raw in input.lines() {
        let mut tokens = match classify(raw) {
            Line::Keyed(tokens) => tokens,
            Line::Passthrough => {
                out.push_str(raw);
                out.push('\n');
                continue;
            }
        };

        match tokens[0] {
            "NumberOfBaryonFields" => {
                let count: usize = value_token(&tokens, "NumberOfBaryonFields")?.parse()?;
                let bumped = (count + new_fields).to_string();
                tokens[2] = &bumped;
                debug!("new NumberOfBaryonFields line: {}", tokens.join(" "));
                out.push_str(&tokens.join(" "));
                out.push('\n');
                continue;
            }
            "BoundaryFieldType" => {
                let codes: Vec<String> = (0..new_fields)
                    .map(|i| (TRACER_TYPE_BASE + i as u32).to_string())
                    .collect();
                tokens.extend(codes.iter().map(String::as_str));
                debug!("new BoundaryFieldType line: {}", tokens.join(" "));
                out.push_str(&tokens.join(" "));
                out.push('\n');
                continue;
            }
            "BoundaryDimension" => {
                ensure!(tokens.len() >= 5, "malformed BoundaryDimension line: {:?}", tokens);
                let dims = [
                    tokens[2].parse::<usize>()?,
                    tokens[3].parse::<usize>()?,
                    tokens[4].parse::<usize>()?,
                ];
                // The regeneration step below assumes a single cubic extent.
                ensure!(
                    dims[0] == dims[1] && dims[0] == dims[2],
                    "the boundary region is not a cube ({} {} {})",
                    dims[0],
                    dims[1],
                    dims[2]
                );
                edge = Some(dims[0]);
                debug!("boundary dimensions: {} {} {}", dims[0], dims[1], dims[2]);
            }
            _ => {}
        }

        out.push_str(raw);
        out.push('\n');
    }

    match edge {
        Some(edge) => Ok((out, edge)),
        None => bail!("no BoundaryDimension line found in the boundary file"),
    }
}

/// Builds the boundary array container for a cubic boundary of the given
/// edge length and total field count.
///
/// Each of the three axes gets a "type" array of ones and a "value" array of
/// zeros, sized for both faces of every field. The type arrays carry the
/// attributes the solver reads back when restarting.
pub fn regenerate(edge: usize, total_fields: usize) -> Container {
    let len = edge * edge * 2 * total_fields;
    let mut container = Container::new();

    for axis in 0..3 {
        // attribute construction cannot fail: lengths always match the shape
        let mut types =
            Dataset::f32(format!("BoundaryDimensionType.{}", axis), vec![len], vec![1.0; len])
                .unwrap();
        types.attributes = vec![
            Attribute::new("BoundaryDimension", vec![edge as i32, edge as i32, 0]),
            Attribute::new("BoundaryRank", vec![3]),
            Attribute::new("Index", vec![2]),
            Attribute::new("NumberOfBaryonFields", vec![total_fields as i32]),
            Attribute::new("size", vec![(edge * edge) as i32]),
        ];
        container.insert(types);
    }

    for axis in 0..3 {
        container.insert(
            Dataset::f32(
                format!("BoundaryDimensionValue.{}", axis),
                vec![len],
                vec![0.0; len],
            )
            .unwrap(),
        );
    }

    container
}

#[cfg(test)]
mod test {
    use super::*;

    const INPUT: &str = "\
BoundaryRank = 3
BoundaryDimension = 16 16 16
NumberOfBaryonFields = 6
BoundaryFieldType = 0 1 4 5 6 19
BoundaryValue = 0 0 0 0 0 0
";

    #[test]
    fn bumps_count_appends_codes_and_captures_edge() {
        let params = Parameters::default();
        let (out, edge) = rewrite(INPUT, &params).unwrap();

        assert_eq!(edge, 16);
        assert!(out.contains("NumberOfBaryonFields = 10"));
        assert!(out.contains("BoundaryFieldType = 0 1 4 5 6 19 106 107 108 109"));
        assert!(out.contains("BoundaryDimension = 16 16 16"));
        assert!(out.contains("BoundaryValue = 0 0 0 0 0 0"));
    }

    #[test]
    fn non_cubic_boundary_is_fatal() {
        let params = Parameters::default();
        let input = INPUT.replace("BoundaryDimension = 16 16 16", "BoundaryDimension = 16 16 8");
        assert!(rewrite(&input, &params).is_err());
    }

    #[test]
    fn missing_dimension_line_is_fatal() {
        let params = Parameters::default();
        assert!(rewrite("NumberOfBaryonFields = 6\n", &params).is_err());
    }

    #[test]
    fn regenerated_arrays_are_sized_and_tagged() {
        let container = regenerate(16, 10);
        assert_eq!(container.len(), 6);

        for axis in 0..3 {
            let types = container
                .dataset(&format!("BoundaryDimensionType.{}", axis))
                .unwrap();
            assert_eq!(types.len(), 16 * 16 * 2 * 10);
            assert!(types.as_f32().unwrap().iter().all(|&x| x == 1.0));
            assert_eq!(
                types.attribute("BoundaryDimension").unwrap().values,
                vec![16, 16, 0]
            );
            assert_eq!(types.attribute("BoundaryRank").unwrap().values, vec![3]);
            assert_eq!(types.attribute("Index").unwrap().values, vec![2]);
            assert_eq!(
                types.attribute("NumberOfBaryonFields").unwrap().values,
                vec![10]
            );
            assert_eq!(types.attribute("size").unwrap().values, vec![256]);

            let values = container
                .dataset(&format!("BoundaryDimensionValue.{}", axis))
                .unwrap();
            assert_eq!(values.len(), 5120);
            assert!(values.as_f32().unwrap().iter().all(|&x| x == 0.0));
            assert!(values.attributes.is_empty());
        }
    }
}
