//! Flat binary container of named, shaped arrays with integer attributes.
//!
//! Every numeric value is stored big-endian, which is what the consuming
//! solver expects. Grid field containers and the boundary condition array
//! file share this format.

use {
    anyhow::{bail, ensure, Context, Result},
    byteorder::{BigEndian, ReadBytesExt, WriteBytesExt},
    ndarray::Array3,
    serde::Deserialize,
    std::{
        fs::File,
        io::{BufReader, BufWriter, Read, Write},
        path::Path,
    },
};

use crate::constants::CONTAINER_MAGIC;

/// Typed payload of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
}

impl Values {
    fn type_code(&self) -> u8 {
        match self {
            Values::F32(_) => 0,
            Values::F64(_) => 1,
            Values::I32(_) => 2,
        }
    }

    fn len(&self) -> usize {
        match self {
            Values::F32(v) => v.len(),
            Values::F64(v) => v.len(),
            Values::I32(v) => v.len(),
        }
    }
}

/// A named list of integers attached to a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<i32>,
}

impl Attribute {
    pub fn new<S: Into<String>>(name: S, values: Vec<i32>) -> Self {
        Attribute {
            name: name.into(),
            values,
        }
    }
}

/// A named, shaped array plus its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub shape: Vec<usize>,
    pub attributes: Vec<Attribute>,
    pub values: Values,
}

impl Dataset {
    pub fn f32<S: Into<String>>(name: S, shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        Self::build(name.into(), shape, Values::F32(values))
    }

    pub fn f64<S: Into<String>>(name: S, shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        Self::build(name.into(), shape, Values::F64(values))
    }

    fn build(name: String, shape: Vec<usize>, values: Values) -> Result<Self> {
        let expected: usize = shape.iter().product();
        ensure!(
            values.len() == expected,
            "dataset {} has {} values but shape {:?} needs {}",
            name,
            values.len(),
            shape,
            expected
        );
        Ok(Dataset {
            name,
            shape,
            attributes: Vec::new(),
            values,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f64(&self) -> Result<&[f64]> {
        match &self.values {
            Values::F64(v) => Ok(v),
            _ => bail!("dataset {} does not hold 64-bit floats", self.name),
        }
    }

    pub fn as_f32(&self) -> Result<&[f32]> {
        match &self.values {
            Values::F32(v) => Ok(v),
            _ => bail!("dataset {} does not hold 32-bit floats", self.name),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// An open container: the full set of datasets held in one file.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Container {
    datasets: Vec<Dataset>,
}

impl Container {
    pub fn new() -> Self {
        Container::default()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut r = BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        );

        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        ensure!(
            &magic == CONTAINER_MAGIC,
            "{} is not an array container",
            path.display()
        );

        let count = r.read_u32::<BigEndian>()? as usize;
        let mut datasets = Vec::with_capacity(count);
        for _ in 0..count {
            datasets.push(read_dataset(&mut r)?);
        }

        Ok(Container { datasets })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut w = BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        );

        w.write_all(CONTAINER_MAGIC)?;
        w.write_u32::<BigEndian>(self.datasets.len() as u32)?;
        for ds in &self.datasets {
            write_dataset(&mut w, ds)?;
        }
        w.flush()?;

        Ok(())
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// Adds a dataset, replacing any existing dataset of the same name.
    pub fn insert(&mut self, dataset: Dataset) {
        match self.datasets.iter_mut().find(|d| d.name == dataset.name) {
            Some(slot) => *slot = dataset,
            None => self.datasets.push(dataset),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let len = r.read_u32::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    w.write_u32::<BigEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_dataset<R: Read>(r: &mut R) -> Result<Dataset> {
    let name = read_string(r)?;
    let type_code = r.read_u8()?;
    let rank = r.read_u8()? as usize;

    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        shape.push(r.read_u32::<BigEndian>()? as usize);
    }

    let nattrs = r.read_u8()? as usize;
    let mut attributes = Vec::with_capacity(nattrs);
    for _ in 0..nattrs {
        let attr_name = read_string(r)?;
        let nvalues = r.read_u32::<BigEndian>()? as usize;
        let mut values = Vec::with_capacity(nvalues);
        for _ in 0..nvalues {
            values.push(r.read_i32::<BigEndian>()?);
        }
        attributes.push(Attribute::new(attr_name, values));
    }

    let len: usize = shape.iter().product();
    let values = match type_code {
        0 => {
            let mut v = vec![0f32; len];
            r.read_f32_into::<BigEndian>(&mut v)?;
            Values::F32(v)
        }
        1 => {
            let mut v = vec![0f64; len];
            r.read_f64_into::<BigEndian>(&mut v)?;
            Values::F64(v)
        }
        2 => {
            let mut v = vec![0i32; len];
            r.read_i32_into::<BigEndian>(&mut v)?;
            Values::I32(v)
        }
        _ => bail!("dataset {} has unknown type code {}", name, type_code),
    };

    Ok(Dataset {
        name,
        shape,
        attributes,
        values,
    })
}

fn write_dataset<W: Write>(w: &mut W, ds: &Dataset) -> Result<()> {
    write_string(w, &ds.name)?;
    w.write_u8(ds.values.type_code())?;
    w.write_u8(ds.shape.len() as u8)?;
    for &dim in &ds.shape {
        w.write_u32::<BigEndian>(dim as u32)?;
    }

    w.write_u8(ds.attributes.len() as u8)?;
    for attr in &ds.attributes {
        write_string(w, &attr.name)?;
        w.write_u32::<BigEndian>(attr.values.len() as u32)?;
        for &v in &attr.values {
            w.write_i32::<BigEndian>(v)?;
        }
    }

    match &ds.values {
        Values::F32(v) => {
            for &x in v {
                w.write_f32::<BigEndian>(x)?;
            }
        }
        Values::F64(v) => {
            for &x in v {
                w.write_f64::<BigEndian>(x)?;
            }
        }
        Values::I32(v) => {
            for &x in v {
                w.write_i32::<BigEndian>(x)?;
            }
        }
    }

    Ok(())
}

/// Axis ordering of rank-3 arrays inside a container.
///
/// The solver keeps its arrays in column-major order (first index fastest),
/// so a field that is (x, y, z) in memory is stored with its axes reversed
/// on disk. Some tool versions instead store arrays row-major; which one a
/// given dataset uses is a configuration choice that must match the
/// consuming tool. All conversions happen here, at the container boundary,
/// never inside field logic.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    Solver,
    RowMajor,
}

impl Default for AxisOrder {
    fn default() -> Self {
        AxisOrder::Solver
    }
}

impl AxisOrder {
    /// In-memory (x, y, z) dimensions of a dataset stored with this ordering.
    pub fn memory_shape(self, disk_shape: &[usize]) -> Result<[usize; 3]> {
        ensure!(
            disk_shape.len() == 3,
            "expected a rank-3 dataset, got shape {:?}",
            disk_shape
        );
        Ok(match self {
            AxisOrder::Solver => [disk_shape[2], disk_shape[1], disk_shape[0]],
            AxisOrder::RowMajor => [disk_shape[0], disk_shape[1], disk_shape[2]],
        })
    }

    /// Decodes a rank-3 f64 dataset into an (x, y, z)-indexed array.
    pub fn read3(self, ds: &Dataset) -> Result<Array3<f64>> {
        ensure!(
            ds.shape.len() == 3,
            "dataset {} has rank {}, expected 3",
            ds.name,
            ds.shape.len()
        );

        let values = ds.as_f64()?.to_vec();
        let arr = Array3::from_shape_vec((ds.shape[0], ds.shape[1], ds.shape[2]), values)?;

        Ok(match self {
            AxisOrder::Solver => arr.permuted_axes([2, 1, 0]),
            AxisOrder::RowMajor => arr,
        })
    }

    /// Encodes an (x, y, z)-indexed array into the on-disk shape and value
    /// sequence for this ordering.
    pub fn to_disk(self, arr: &Array3<f64>) -> (Vec<usize>, Vec<f64>) {
        let (nx, ny, nz) = arr.dim();
        let mut values = Vec::with_capacity(nx * ny * nz);

        match self {
            AxisOrder::Solver => {
                for k in 0..nz {
                    for j in 0..ny {
                        for i in 0..nx {
                            values.push(arr[[i, j, k]]);
                        }
                    }
                }
                (vec![nz, ny, nx], values)
            }
            AxisOrder::RowMajor => {
                for i in 0..nx {
                    for j in 0..ny {
                        for k in 0..nz {
                            values.push(arr[[i, j, k]]);
                        }
                    }
                }
                (vec![nx, ny, nz], values)
            }
        }
    }
}
