//! Hierarchy file patcher: bumps each grid entry's baryon field count and
//! appends the new fields' type codes to its field type list.

use {
    anyhow::Result,
    log::debug,
    std::fs,
};

use crate::{
    constants::TRACER_TYPE_BASE,
    parameters::Parameters,
    patch::{classify, value_token, Line},
    swap::SwapFile,
};

pub fn patch(params: &Parameters) -> Result<()> {
    let swap = SwapFile::begin(params.hierarchy_file())?;
    let input = fs::read_to_string(swap.original())?;
    let output = rewrite(&input, params)?;
    fs::write(swap.scratch(), output)?;
    swap.commit()
}

/// Pure rewrite of the hierarchy file text. Every grid entry is modified the
/// same way; all other lines pass through untouched.
pub fn rewrite(input: &str, params: &Parameters) -> Result<String> {
    let new_fields = params.tracer.new_fields;
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
            }
            "FieldType" => {
                let codes: Vec<String> = (0..new_fields)
                    .map(|i| (TRACER_TYPE_BASE + i as u32).to_string())
                    .collect();
                tokens.extend(codes.iter().map(String::as_str));
                debug!("new FieldType line: {}", tokens.join(" "));
                out.push_str(&tokens.join(" "));
            }
            _ => out.push_str(raw),
        }
        out.push('\n');
    }

    Ok(out)
}
