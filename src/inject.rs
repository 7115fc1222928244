//! Grid field injector: writes the tracer fluid arrays into every grid's
//! container, seeded from the density field inside nested spheres.
//!
//! The fields must be added to every grid, even where the seeded region does
//! not reach: the solver expects all grids to carry the same field set.
//! Cells outside the region just get the fill value.

use {
    anyhow::{bail, ensure, Context, Result},
    log::{debug, info},
    ndarray::Array3,
    std::{fs, path::PathBuf, thread, time::Duration},
};

use crate::{
    container::{Container, Dataset},
    index::{read_hierarchy, GridEntry},
    parameters::Parameters,
    patch::{classify, value_token, Line},
};

/// Tracer flag and tracer field count, as read back from a parameter file.
fn tracer_state(input: &str) -> Result<(bool, usize)> {
    let mut enabled = None;
    let mut count = None;

    for raw in input.lines() {
        let tokens = match classify(raw) {
            Line::Keyed(tokens) => tokens,
            Line::Passthrough => continue,
        };
        match tokens[0] {
            "UseTracerFluid" => {
                enabled = Some(value_token(&tokens, "UseTracerFluid")?.parse::<i64>()? == 1)
            }
            "NumberOfTracerFluidFields" => {
                count =
                    Some(value_token(&tokens, "NumberOfTracerFluidFields")?.parse::<usize>()?)
            }
            _ => {}
        }
    }

    match (enabled, count) {
        (Some(enabled), Some(count)) => Ok((enabled, count)),
        _ => bail!(
            "the parameter file has no tracer fluid keys; this dataset may not have \
             tracer fluids in it"
        ),
    }
}

/// Euclidean distance from each cell centre to `center`, shaped like the
/// grid's active region.
fn cell_radii(grid: &GridEntry, center: [f64; 3]) -> Array3<f64> {
    let dims = grid.active_dimensions();
    let dx = grid.cell_widths();

    Array3::from_shape_fn((dims[0], dims[1], dims[2]), |(i, j, k)| {
        let x = grid.left_edge[0] + (0.5 + i as f64) * dx[0] - center[0];
        let y = grid.left_edge[1] + (0.5 + j as f64) * dx[1] - center[1];
        let z = grid.left_edge[2] + (0.5 + k as f64) * dx[2] - center[2];
        (x * x + y * y + z * z).sqrt()
    })
}

fn inject_grid(grid: &GridEntry, params: &Parameters) -> Result<()> {
    debug!(
        "working on grid {} in file {}",
        grid.id,
        grid.baryon_file.display()
    );

    let order = params.tracer.axis_order;
    let mut container = Container::open(&grid.baryon_file)?;

    // Density always exists in a simulation with baryons, and gives the new
    // fields values with sensible units.
    let density_name = grid.field_name("Density");
    let density = container
        .dataset(&density_name)
        .with_context(|| format!("{} not found in {}", density_name, grid.baryon_file.display()))?;
    let density = order.read3(density)?;

    let dims = grid.active_dimensions();
    ensure!(
        density.dim() == (dims[0], dims[1], dims[2]),
        "grid {} density has shape {:?}, hierarchy says {:?}",
        grid.id,
        density.dim(),
        dims
    );

    let radii = cell_radii(grid, params.tracer.sphere_center);

    // Tracer fields are 1-indexed
    for n in 1..=params.tracer.new_fields {
        // each field's sphere is larger than the last
        let threshold = params.tracer.sphere_radius_step * n as f64;

        let mut field = Array3::from_elem(density.dim(), params.tracer.fill_value);
        for i in 0..dims[0] {
            for j in 0..dims[1] {
                for k in 0..dims[2] {
                    if radii[[i, j, k]] <= threshold {
                        field[[i, j, k]] = density[[i, j, k]];
                    }
                }
            }
        }

        let name = grid.field_name(&format!("TracerFluid{:02}", n));
        debug!("writing {} (radius {})", name, threshold);

        let (shape, values) = order.to_disk(&field);
        container.insert(Dataset::f64(name, shape, values)?);
    }

    if params.run.dry_run {
        info!(
            "dry run, not writing grid {} back to {}",
            grid.id,
            grid.baryon_file.display()
        );
    } else {
        container.write(&grid.baryon_file)?;
    }

    Ok(())
}

/// Injects the tracer fluid fields into every grid of the dataset, in
/// hierarchy order.
pub fn inject_tracer_fields(params: &Parameters) -> Result<()> {
    let param_file = params.param_file();
    let param_text = fs::read_to_string(&param_file)
        .with_context(|| format!("failed to read {}", param_file.display()))?;

    let (enabled, count) = tracer_state(&param_text)?;
    ensure!(
        enabled,
        "tracer fluids are not enabled in {}; patch the dataset first",
        param_file.display()
    );
    ensure!(
        params.tracer.new_fields <= count,
        "{} tracer fields requested but the dataset has {}",
        params.tracer.new_fields,
        count
    );

    let grids = read_hierarchy(params.hierarchy_file(), &params.dataset.directory)?;
    info!("modifying tracer fluid fields on {} grids", grids.len());

    let mut previous: Option<PathBuf> = None;
    for grid in &grids {
        if params.run.reopen_delay_ms > 0 && previous.as_deref() == Some(grid.baryon_file.as_path()) {
            // Some network filesystems hand back a stale handle when a file
            // is reopened immediately after being closed.
            debug!(
                "waiting {} ms before reopening {}",
                params.run.reopen_delay_ms,
                grid.baryon_file.display()
            );
            thread::sleep(Duration::from_millis(params.run.reopen_delay_ms));
        }

        inject_grid(grid, params)?;
        previous = Some(grid.baryon_file.clone());
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use {super::*, approx::assert_abs_diff_eq};

    #[test]
    fn tracer_state_reads_both_keys() {
        let (enabled, count) =
            tracer_state("UseTracerFluid = 1\nNumberOfTracerFluidFields = 4\n").unwrap();
        assert!(enabled);
        assert_eq!(count, 4);

        let (enabled, count) =
            tracer_state("UseTracerFluid = 0\nNumberOfTracerFluidFields = 0\n").unwrap();
        assert!(!enabled);
        assert_eq!(count, 0);
    }

    #[test]
    fn tracer_state_requires_both_keys() {
        assert!(tracer_state("UseTracerFluid = 1\n").is_err());
        assert!(tracer_state("CourantSafetyNumber = 0.3\n").is_err());
    }

    #[test]
    fn cell_radii_are_centred() {
        let grid = GridEntry {
            id: 1,
            left_edge: [0.0, 0.0, 0.0],
            right_edge: [1.0, 1.0, 1.0],
            start_index: [3, 3, 3],
            end_index: [18, 18, 18],
            baryon_file: PathBuf::new(),
        };

        let radii = cell_radii(&grid, [0.5, 0.5, 0.5]);
        assert_eq!(radii.dim(), (16, 16, 16));

        // cell widths are 1/16, so the nearest cell centres sit half a
        // diagonal cell width from the midpoint
        let half: f64 = 0.5 / 16.0;
        let expected = (3.0 * half * half).sqrt();
        assert_abs_diff_eq!(radii[[7, 7, 7]], expected, epsilon = 1.0e-12);
        assert_abs_diff_eq!(radii[[8, 8, 8]], expected, epsilon = 1.0e-12);

        // corner cell is the farthest
        let corner: f64 = 0.5 - half;
        assert_abs_diff_eq!(
            radii[[0, 0, 0]],
            (3.0 * corner * corner).sqrt(),
            epsilon = 1.0e-12
        );
    }
}
