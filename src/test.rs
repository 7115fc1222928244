use {
    crate::{
        container::{AxisOrder, Container, Dataset},
        inject::inject_tracer_fields,
        parameters::Parameters,
        patch::{boundary, patch_dataset},
    },
    ndarray::Array3,
    std::{fs, path::Path},
    tempdir::TempDir,
};

const PARAM_FILE: &str = "\
InitialCycleNumber = 0
TopGridRank = 3
TopGridDimensions = 16 16 16
UseTracerFluid = 0
NumberOfTracerFluidFields = 0
CourantSafetyNumber = 0.3
";

const HIERARCHY_FILE: &str = "\
Grid = 1
Task              = 0
GridRank          = 3
GridStartIndex    = 3 3 3
GridEndIndex      = 18 18 18
GridLeftEdge      = 0 0 0
GridRightEdge     = 1 1 1
NumberOfBaryonFields = 6
FieldType = 0 1 4 5 6 19
BaryonFileName = ./DD0000/DD0000.cpu0000
Pointer: Grid[1]->NextGridThisLevel = 0
Pointer: Grid[1]->NextGridNextLevel = 2

Grid = 2
Task              = 0
GridRank          = 3
GridStartIndex    = 3 3 3
GridEndIndex      = 10 10 10
GridLeftEdge      = 0.25 0.25 0.25
GridRightEdge     = 0.5 0.5 0.5
NumberOfBaryonFields = 6
FieldType = 0 1 4 5 6 19
BaryonFileName = ./DD0000/DD0000.cpu0000
Pointer: Grid[2]->NextGridThisLevel = 0
";

const BOUNDARY_FILE: &str = "\
BoundaryRank = 3
BoundaryDimension = 16 16 16
NumberOfBaryonFields = 6
BoundaryFieldType = 0 1 4 5 6 19
";

fn test_params(dir: &Path) -> Parameters {
    let mut params = Parameters::default();
    params.dataset.directory = dir.to_owned();
    params
}

fn density(seed: f64, dims: (usize, usize, usize)) -> Array3<f64> {
    Array3::from_shape_fn(dims, |(i, j, k)| {
        seed + i as f64 + 10.0 * j as f64 + 100.0 * k as f64
    })
}

/// Writes a small two-grid dataset, both grids sharing one container.
fn make_dataset(params: &Parameters) {
    fs::write(params.param_file(), PARAM_FILE).unwrap();
    fs::write(params.hierarchy_file(), HIERARCHY_FILE).unwrap();
    fs::write(params.boundary_file(), BOUNDARY_FILE).unwrap();

    // pre-injection boundary arrays, sized for the original six fields
    boundary::regenerate(16, 6)
        .write(params.boundary_array_file())
        .unwrap();

    let order = params.tracer.axis_order;
    let mut grids = Container::new();
    for (id, dims, seed) in &[(1, (16, 16, 16), 1.0), (2, (8, 8, 8), 2.0)] {
        let (shape, values) = order.to_disk(&density(*seed, *dims));
        grids.insert(
            Dataset::f64(format!("Grid{:08}/Density", id), shape, values).unwrap(),
        );
    }
    grids
        .write(params.dataset.directory.join("DD0000.cpu0000"))
        .unwrap();
}

#[test]
fn full_injection_updates_every_file() {
    let dir = TempDir::new("field-injector").unwrap();
    let params = test_params(dir.path());
    make_dataset(&params);

    patch_dataset(&params).unwrap();
    inject_tracer_fields(&params).unwrap();

    // parameter file: feature on, four tracer fields, labels 6 through 9
    let param = fs::read_to_string(params.param_file()).unwrap();
    assert!(param.contains("UseTracerFluid  =  1"));
    assert!(param.contains("NumberOfTracerFluidFields  =  4"));
    assert!(param.contains("DataLabel[6]             = TracerFluid01"));
    assert!(param.contains("DataLabel[7]             = TracerFluid02"));
    assert!(param.contains("DataLabel[8]             = TracerFluid03"));
    assert!(param.contains("DataLabel[9]             = TracerFluid04"));
    assert!(!param.contains("DataLabel[5]"));
    assert!(!param.contains("DataLabel[10]"));

    // hierarchy: both grids read six plus four fields
    let hierarchy = fs::read_to_string(params.hierarchy_file()).unwrap();
    assert_eq!(hierarchy.matches("NumberOfBaryonFields = 10").count(), 2);
    assert_eq!(
        hierarchy
            .matches("FieldType = 0 1 4 5 6 19 106 107 108 109")
            .count(),
        2
    );

    // boundary text file agrees on the field count
    let boundary_text = fs::read_to_string(params.boundary_file()).unwrap();
    assert!(boundary_text.contains("NumberOfBaryonFields = 10"));
    assert!(boundary_text.contains("BoundaryFieldType = 0 1 4 5 6 19 106 107 108 109"));

    // regenerated boundary arrays are sized edge^2 x 2 faces x 10 fields
    let boundary_arrays = Container::open(params.boundary_array_file()).unwrap();
    assert_eq!(boundary_arrays.len(), 6);
    for axis in 0..3 {
        let types = boundary_arrays
            .dataset(&format!("BoundaryDimensionType.{}", axis))
            .unwrap();
        assert_eq!(types.len(), 16 * 16 * 2 * 10);
        assert_eq!(
            types.attribute("NumberOfBaryonFields").unwrap().values,
            vec![10]
        );
    }

    // every grid carries all four new fields, shaped like its density
    let grids = Container::open(dir.path().join("DD0000.cpu0000")).unwrap();
    for (id, edge) in &[(1usize, 16usize), (2, 8)] {
        let density = grids
            .dataset(&format!("Grid{:08}/Density", id))
            .unwrap();
        for n in 1..=4 {
            let tracer = grids
                .dataset(&format!("Grid{:08}/TracerFluid{:02}", id, n))
                .unwrap();
            assert_eq!(tracer.shape, density.shape);
            assert_eq!(tracer.shape, vec![*edge; 3]);
        }
        assert!(grids
            .dataset(&format!("Grid{:08}/TracerFluid05", id))
            .is_none());
    }

    // backups of all four patched files remain
    for name in &[
        "DD0000.orig",
        "DD0000.hierarchy.orig",
        "DD0000.boundary.orig",
        "DD0000.boundary.hdf.orig",
    ] {
        assert!(dir.path().join(name).exists(), "{} missing", name);
    }
}

#[test]
fn injected_fields_reproduce_the_spatial_predicate() {
    let dir = TempDir::new("field-injector").unwrap();
    let params = test_params(dir.path());
    make_dataset(&params);

    patch_dataset(&params).unwrap();
    inject_tracer_fields(&params).unwrap();

    let order = params.tracer.axis_order;
    let grids = Container::open(dir.path().join("DD0000.cpu0000")).unwrap();

    let expected_density = density(1.0, (16, 16, 16));
    let read_density = order
        .read3(grids.dataset("Grid00000001/Density").unwrap())
        .unwrap();
    assert_eq!(expected_density, read_density);

    for n in 1..=4usize {
        let tracer = order
            .read3(
                grids
                    .dataset(&format!("Grid00000001/TracerFluid{:02}", n))
                    .unwrap(),
            )
            .unwrap();

        let threshold = params.tracer.sphere_radius_step * n as f64;
        let mut seeded = 0;
        for i in 0..16 {
            for j in 0..16 {
                for k in 0..16 {
                    let x = (0.5 + i as f64) / 16.0 - 0.5;
                    let y = (0.5 + j as f64) / 16.0 - 0.5;
                    let z = (0.5 + k as f64) / 16.0 - 0.5;
                    let radius = (x * x + y * y + z * z).sqrt();

                    if radius <= threshold {
                        assert_eq!(tracer[[i, j, k]], expected_density[[i, j, k]]);
                        seeded += 1;
                    } else {
                        assert_eq!(tracer[[i, j, k]], params.tracer.fill_value);
                    }
                }
            }
        }

        // the largest sphere must actually reach into this grid
        if n == 4 {
            assert!(seeded > 0);
        }
    }
}

#[test]
fn repatching_a_patched_dataset_fails_without_modifying_it() {
    let dir = TempDir::new("field-injector").unwrap();
    let params = test_params(dir.path());
    make_dataset(&params);

    patch_dataset(&params).unwrap();
    let patched = fs::read_to_string(params.param_file()).unwrap();

    // leftover backups alone abort a re-run
    assert!(patch_dataset(&params).is_err());

    // even with the backups cleared, the key checks refuse a second pass
    for name in &[
        "DD0000.orig",
        "DD0000.hierarchy.orig",
        "DD0000.boundary.orig",
        "DD0000.boundary.hdf.orig",
    ] {
        fs::remove_file(dir.path().join(name)).unwrap();
    }
    assert!(patch_dataset(&params).is_err());

    assert_eq!(fs::read_to_string(params.param_file()).unwrap(), patched);
}

#[test]
fn non_cubic_root_grid_aborts_before_any_output() {
    let dir = TempDir::new("field-injector").unwrap();
    let params = test_params(dir.path());
    make_dataset(&params);
    fs::write(
        params.param_file(),
        PARAM_FILE.replace("TopGridDimensions = 16 16 16", "TopGridDimensions = 32 32 16"),
    )
    .unwrap();

    let before = fs::read_to_string(params.param_file()).unwrap();
    assert!(patch_dataset(&params).is_err());

    assert_eq!(fs::read_to_string(params.param_file()).unwrap(), before);
    assert!(!dir.path().join("DD0000.new").exists());
    // the hierarchy was never reached
    assert!(!dir.path().join("DD0000.hierarchy.orig").exists());
}

#[test]
fn dry_run_leaves_the_dataset_untouched() {
    let dir = TempDir::new("field-injector").unwrap();
    let mut params = test_params(dir.path());
    make_dataset(&params);

    params.run.dry_run = true;
    patch_dataset(&params).unwrap();
    assert_eq!(fs::read_to_string(params.param_file()).unwrap(), PARAM_FILE);
    assert!(!dir.path().join("DD0000.orig").exists());

    params.run.dry_run = false;
    patch_dataset(&params).unwrap();
    let grids_before = fs::read(dir.path().join("DD0000.cpu0000")).unwrap();

    params.run.dry_run = true;
    inject_tracer_fields(&params).unwrap();

    assert_eq!(
        fs::read(dir.path().join("DD0000.cpu0000")).unwrap(),
        grids_before
    );
}

#[test]
fn requesting_more_fields_than_the_dataset_has_is_fatal() {
    let dir = TempDir::new("field-injector").unwrap();
    let mut params = test_params(dir.path());
    params.tracer.new_fields = 2;
    make_dataset(&params);

    patch_dataset(&params).unwrap();

    params.tracer.new_fields = 4;
    assert!(inject_tracer_fields(&params).is_err());
}

#[test]
fn row_major_datasets_round_trip_too() {
    let dir = TempDir::new("field-injector").unwrap();
    let mut params = test_params(dir.path());
    params.tracer.axis_order = AxisOrder::RowMajor;
    make_dataset(&params);

    patch_dataset(&params).unwrap();
    inject_tracer_fields(&params).unwrap();

    let grids = Container::open(dir.path().join("DD0000.cpu0000")).unwrap();
    let tracer = params
        .tracer
        .axis_order
        .read3(grids.dataset("Grid00000002/TracerFluid01").unwrap())
        .unwrap();
    assert_eq!(tracer.dim(), (8, 8, 8));

    // grid 2 sits right on the sphere centre, so its innermost corner cell
    // is seeded even by the smallest sphere
    let expected = density(2.0, (8, 8, 8));
    assert_eq!(tracer[[7, 7, 7]], expected[[7, 7, 7]]);
}
