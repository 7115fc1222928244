//! Line-oriented patchers for the dataset's text files, plus regeneration of
//! the boundary condition array file.
//!
//! Each patcher is a pure rewrite from input text to output text; the actual
//! file replacement goes through [`crate::swap::SwapFile`]. The rewrites must
//! stay mutually consistent: the parameter, hierarchy and boundary files all
//! duplicate the baryon field count, and the solver refuses datasets where
//! they disagree.

pub mod boundary;
pub mod hierarchy;
pub mod param;

use {
    anyhow::{ensure, Result},
    log::info,
};

use crate::parameters::Parameters;

/// A classified input line: a `KEY = VALUE ...` candidate (whitespace
/// tokens, first token is the key) or anything else, passed through
/// untouched.
pub(crate) enum Line<'a> {
    Keyed(Vec<&'a str>),
    Passthrough,
}

pub(crate) fn classify(raw: &str) -> Line {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.is_empty() {
        Line::Passthrough
    } else {
        Line::Keyed(tokens)
    }
}

/// The value token of a `KEY = VALUE` line.
pub(crate) fn value_token<'a>(tokens: &[&'a str], key: &str) -> Result<&'a str> {
    ensure!(tokens.len() >= 3, "malformed {} line: {:?}", key, tokens);
    Ok(tokens[2])
}

/// Patches the parameter, hierarchy and boundary files of one dataset, in
/// that order. There is no rollback across files: if a later patcher fails,
/// the earlier files stay patched and must be restored from their backups.
pub fn patch_dataset(params: &Parameters) -> Result<()> {
    if params.run.dry_run {
        info!("dry run, skipping parameter file patch");
        info!("dry run, skipping hierarchy file patch");
        info!("dry run, skipping boundary file patch");
        return Ok(());
    }

    param::patch(params)?;
    hierarchy::patch(params)?;
    boundary::patch(params)?;

    Ok(())
}
