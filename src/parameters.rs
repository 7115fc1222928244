use {
    crate::{constants::TINY_NUMBER, container::AxisOrder},
    serde::Deserialize,
    std::path::PathBuf,
};

/// Injection parameters
#[derive(Debug, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub dataset: Dataset,
    pub tracer: Tracer,
    pub run: Run,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Dataset {
    /// Directory the dataset to be modified lives in
    pub directory: PathBuf,
    /// Name of the restart parameter file inside the dataset directory; the
    /// names of the other dataset files are derived from it
    pub filename_stem: String,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Tracer {
    /// Number of tracer fluid fields to inject (1 to 8)
    pub new_fields: usize,
    /// Number of baryon fields in the unmodified dataset
    pub original_fields: usize,
    /// Centre of the seeded sphere, in the simulation's internal coordinates
    pub sphere_center: [f64; 3],
    /// Seeding radius of field n is n times this
    pub sphere_radius_step: f64,
    /// Value given to tracer cells outside the seeded sphere
    pub fill_value: f64,
    /// Axis ordering of arrays inside the grid containers
    pub axis_order: AxisOrder,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Run {
    /// Perform every check and computation but leave the dataset untouched
    pub dry_run: bool,
    /// Log at debug level
    pub verbose: bool,
    /// Milliseconds to wait before reopening a container shared with the
    /// previous grid (stale-handle workaround on some network filesystems)
    pub reopen_delay_ms: u64,
}

impl Default for Dataset {
    fn default() -> Self {
        Dataset {
            directory: PathBuf::from("."),
            filename_stem: "DD0000".to_string(),
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer {
            new_fields: 4,
            original_fields: 6,
            sphere_center: [0.5, 0.5, 0.5],
            sphere_radius_step: 0.031_25,
            fill_value: TINY_NUMBER,
            axis_order: AxisOrder::Solver,
        }
    }
}

impl Default for Run {
    fn default() -> Self {
        Run {
            dry_run: false,
            verbose: false,
            reopen_delay_ms: 0,
        }
    }
}

impl Parameters {
    pub fn validate(&self) -> anyhow::Result<()> {
        use crate::constants::MAX_TRACER_FIELDS;

        anyhow::ensure!(
            (1..=MAX_TRACER_FIELDS).contains(&self.tracer.new_fields),
            "new_fields must be between 1 and {}, got {}",
            MAX_TRACER_FIELDS,
            self.tracer.new_fields
        );
        anyhow::ensure!(
            self.tracer.original_fields > 0,
            "original_fields must be positive, got {}",
            self.tracer.original_fields
        );
        anyhow::ensure!(
            self.tracer.sphere_radius_step > 0.0,
            "sphere_radius_step must be positive, got {}",
            self.tracer.sphere_radius_step
        );

        Ok(())
    }

    /// Path of the restart parameter file.
    pub fn param_file(&self) -> PathBuf {
        self.dataset.directory.join(&self.dataset.filename_stem)
    }

    /// Path of the per-grid metadata (hierarchy) file.
    pub fn hierarchy_file(&self) -> PathBuf {
        self.dataset
            .directory
            .join(format!("{}.hierarchy", self.dataset.filename_stem))
    }

    /// Path of the boundary condition text file.
    pub fn boundary_file(&self) -> PathBuf {
        self.dataset
            .directory
            .join(format!("{}.boundary", self.dataset.filename_stem))
    }

    /// Path of the boundary condition array container.
    pub fn boundary_array_file(&self) -> PathBuf {
        self.dataset
            .directory
            .join(format!("{}.boundary.hdf", self.dataset.filename_stem))
    }
}
