use argh::FromArgs;
use std::path::PathBuf;

use kornia_cpd::{
    register, AffineEstimator, ConvergenceCriteria, Cpd, CpdParams, CpdResult, Estimator,
    PointCloud2d, RigidEstimator,
};

#[derive(FromArgs)]
/// Example of Coherent Point Drift registration of two 2d point clouds
struct Args {
    /// path to a json file with the `target` and `source` point lists
    #[argh(option)]
    input: PathBuf,

    /// transform model: affine, rigid or similarity
    #[argh(option, default = "String::from(\"affine\")")]
    model: String,

    /// maximum number of iterations
    #[argh(option, default = "100")]
    max_iterations: usize,

    /// stop when the change of the objective is below this value, overrides the file
    #[argh(option)]
    tolerance: Option<f64>,

    /// weight of the uniform noise component, overrides the file
    #[argh(option)]
    w: Option<f64>,
}

/// Layout of the input file.
#[derive(serde::Deserialize)]
struct Input {
    target: PointCloud2d,
    source: PointCloud2d,
    #[serde(default)]
    params: Option<CpdParams>,
}

/// Apply the command line values on top of the parameters read from the file.
///
/// The tolerance drives both the variance floor and the stopping criteria.
fn resolve(
    file_params: Option<CpdParams>,
    tolerance: Option<f64>,
    w: Option<f64>,
    max_iterations: usize,
) -> (CpdParams, ConvergenceCriteria) {
    let mut params = file_params.unwrap_or_default();
    if let Some(tolerance) = tolerance {
        params = params.with_tolerance(tolerance);
    }
    if let Some(w) = w {
        params = params.with_noise_weight(w);
    }
    let criteria = ConvergenceCriteria {
        max_iterations,
        tolerance: params.tolerance,
    };
    (params, criteria)
}

fn run<E>(
    input: Input,
    params: CpdParams,
    criteria: &ConvergenceCriteria,
    estimator: E,
) -> Result<(), Box<dyn std::error::Error>>
where
    E: Estimator,
    E::Transform: serde::Serialize,
{
    let mut cpd = Cpd::new(input.target, input.source, params, estimator)?;
    let result: CpdResult<E::Transform> = register(&mut cpd, criteria)?;

    println!(
        "CPD registration: #{} iterations, converged: {}, sigma2: {}",
        result.num_iterations, result.converged, result.sigma2
    );
    println!("{}", serde_json::to_string_pretty(&result.transform)?);
    println!("{}", serde_json::to_string(&result.transformed)?);

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let input: Input = serde_json::from_reader(std::fs::File::open(&args.input)?)?;
    println!(
        "Target cloud: #{} points, source cloud: #{} points",
        input.target.len(),
        input.source.len()
    );

    let (params, criteria) = resolve(
        input.params,
        args.tolerance,
        args.w,
        args.max_iterations,
    );
    log::info!("params: {:?} criteria: {:?}", params, criteria);

    match args.model.as_str() {
        "affine" => run(input, params, &criteria, AffineEstimator::new()),
        "rigid" => run(input, params, &criteria, RigidEstimator::rigid()),
        "similarity" => run(input, params, &criteria, RigidEstimator::similarity()),
        other => Err(format!("unknown model: {other}").into()),
    }
}
