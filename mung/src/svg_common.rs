#![allow(dead_code)]

pub type Mat = nalgebra::DMatrix<f64>;
pub type DVec = nalgebra::DVector<f64>;
pub type BinMat = nalgebra::DMatrix<u8>;

pub use indicatif::ParallelProgressIterator;
pub use log::{info, warn};
pub use rayon::prelude::*;
pub use std::collections::{HashMap, HashSet};
