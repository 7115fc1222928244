//! Parameter file patcher: turns the tracer fluid feature on, sets the
//! tracer field count and appends data labels for the new fields.

use {
    anyhow::{bail, ensure, Result},
    log::debug,
    std::fs,
};

use crate::{
    parameters::Parameters,
    patch::{classify, value_token, Line},
    swap::SwapFile,
};

pub fn patch(params: &Parameters) -> Result<()> {
    let swap = SwapFile::begin(params.param_file())?;
    let input = fs::read_to_string(swap.original())?;
    let output = rewrite(&input, params)?;
    fs::write(swap.scratch(), output)?;
    swap.commit()
}

/// Pure rewrite of the parameter file text.
///
/// Fails on datasets that already carry tracer fluids, and on datasets the
/// injection math cannot handle (non-3D, non-cubic root grid). Datasets
/// predating the tracer fluid keys get them appended instead.
pub fn rewrite(input: &str, params: &Parameters) -> Result<String> {
    let count = params.tracer.new_fields.to_string();

    let mut saw_flag = false;
    let mut saw_count = false;
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
            // The injection math assumes a 3D simulation with a cubic root
            // grid; check both before anything is committed.
            "TopGridRank" => {
                let rank: i64 = value_token(&tokens, "TopGridRank")?.parse()?;
                ensure!(
                    rank == 3,
                    "expected a 3D simulation, this dataset has dimensionality {}",
                    rank
                );
            }
            "TopGridDimensions" => {
                ensure!(tokens.len() >= 5, "malformed TopGridDimensions line: {:?}", tokens);
                let dims = [
                    tokens[2].parse::<i64>()?,
                    tokens[3].parse::<i64>()?,
                    tokens[4].parse::<i64>()?,
                ];
                ensure!(
                    dims[0] == dims[1] && dims[0] == dims[2],
                    "expected a cubic root grid, this dataset has dimensions {} {} {}",
                    dims[0],
                    dims[1],
                    dims[2]
                );
            }
            "UseTracerFluid" => {
                saw_flag = true;
                if value_token(&tokens, "UseTracerFluid")?.parse::<i64>()? == 1 {
                    bail!("this parameter file already has tracer fluids (UseTracerFluid = 1)");
                }
                tokens[2] = "1";
                debug!("new UseTracerFluid line: {}", tokens.join("  "));
                out.push_str(&tokens.join("  "));
                out.push('\n');
                continue;
            }
            "NumberOfTracerFluidFields" => {
                saw_count = true;
                if value_token(&tokens, "NumberOfTracerFluidFields")?.parse::<i64>()? > 0 {
                    bail!(
                        "this parameter file already has tracer fluids \
                         (NumberOfTracerFluidFields > 0)"
                    );
                }
                tokens[2] = &count;
                debug!("new NumberOfTracerFluidFields line: {}", tokens.join("  "));
                out.push_str(&tokens.join("  "));
                out.push('\n');
                continue;
            }
            _ => {}
        }

        out.push_str(raw);
        out.push('\n');
    }

    // Datasets older than the tracer fluid feature have none of these keys.
    if !saw_flag {
        debug!("UseTracerFluid line did not exist, creating it");
        out.push_str("UseTracerFluid = 1\n");
    }
    if !saw_count {
        debug!("NumberOfTracerFluidFields line did not exist, creating it");
        out.push_str(&format!("NumberOfTracerFluidFields = {}\n", count));
    }
    if !saw_flag && !saw_count {
        debug!("SetTracerFluidFieldsOnStart line did not exist, creating it");
        out.push_str("SetTracerFluidFieldsOnStart = 0\n");
    }

    // Data labels are not needed by the solver itself but downstream
    // analysis tools expect every field to be labelled. The new fields sit
    // after the original ones in each grid entry.
    for i in 0..params.tracer.new_fields {
        out.push_str(&format!(
            "DataLabel[{}]             = TracerFluid{:02}\n",
            i + params.tracer.original_fields,
            i + 1
        ));
    }

    Ok(out)
}
