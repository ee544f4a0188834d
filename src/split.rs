use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of one train/validation partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle split; the test side gets `ceil(test_fraction × n)` rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> SplitIndices {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n);
    let train = indices.split_off(n_test);
    SplitIndices {
        train,
        test: indices,
    }
}

/// Unshuffled K-fold: contiguous test folds, the first `n % k` one row larger.
pub fn kfold(n: usize, k: usize) -> Vec<SplitIndices> {
    let k = k.max(1);
    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        folds.push(SplitIndices {
            train: (0..start).chain(end..n).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }
    folds
}

pub fn take<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| items[i].clone()).collect()
}
