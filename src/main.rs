#[macro_use]
extern crate clap;

use {
    anyhow::{bail, Result},
    field_injector::{inject::inject_tracer_fields, parameters::Parameters, patch::patch_dataset},
    log::{error, info},
    simplelog::{Config as LogConfig, LevelFilter, TermLogger, TerminalMode},
    std::fs::File,
};

#[quit::main]
fn main() {
    let matches = clap_app!(field_injector =>
        (version: crate_version!())
        (about: "Injects tracer fluid fields into an existing simulation dataset in-place. Back up the dataset before running this.")
        (@arg PARAMETERS: -p --parameters +takes_value +required "Path to file containing injection parameters.")
        (@subcommand patch =>
            (about: "Patches the parameter, hierarchy and boundary files so the dataset declares the new tracer fluid fields.")
        )
        (@subcommand fields =>
            (about: "Writes the tracer fluid field arrays into every grid's container, seeded from the density field.")
        )
        (@subcommand inject =>
            (about: "Runs patch followed by fields: the full injection into one dataset.")
        )
    )
    .get_matches();

    let params = {
        // Should never panic as clap should return an error if the argument was not supplied
        let path = matches
            .value_of("PARAMETERS")
            .expect("Path to parameters file not supplied");

        let file = File::open(path).unwrap_or_else(|e| {
            eprintln!("Failed to open {}: \"{}\"", path, e);
            quit::with_code(1);
        });

        serde_yaml::from_reader::<_, Parameters>(file).unwrap_or_else(|e| {
            eprintln!("Failed to parse parameters from {}: \"{}\"", path, e);
            quit::with_code(1);
        })
    };

    TermLogger::init(
        if params.run.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        },
        LogConfig::default(),
        TerminalMode::Mixed,
    )
    .expect("Failed to initialize logger");

    info!(
        "Loaded injection parameters: \n{:#?}",
        params
    );

    run_subcommand(matches.subcommand_name(), params).unwrap_or_else(|e| {
        error!("Error: \"{}\"", e);
        quit::with_code(1);
    });
}

fn run_subcommand(subcmd: Option<&str>, params: Parameters) -> Result<()> {
    let subcmd = match subcmd {
        Some(s) => s,
        None => bail!("No subcommand selected"),
    };

    params.validate()?;

    info!("Starting {}", subcmd);

    match subcmd {
        "patch" => {
            patch_dataset(&params)?;
        }
        "fields" => {
            inject_tracer_fields(&params)?;
        }
        "inject" => {
            patch_dataset(&params)?;
            inject_tracer_fields(&params)?;
        }
        _ => {
            // Should be unreachable due to clap catching this error
            bail!("Unrecognized subcommand");
        }
    }

    info!("Finished {}", subcmd);

    Ok(())
}
