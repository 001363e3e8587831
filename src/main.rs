use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{arg, command, value_parser, ArgAction};
use serde::de::IntoDeserializer;
use serde::Deserialize;

use afx_record_import::agr::GameRecordImporter;
use afx_record_import::animation::Interpolation;
use afx_record_import::cam::CamImporter;
use afx_record_import::config::ImportOptions;
use afx_record_import::sink::SceneDocument;
use afx_record_import::skeleton::TomlSkeletonImporter;

fn parse_interpolation(value: &str) -> Result<Interpolation, serde::de::value::Error> {
    Interpolation::deserialize(value.into_deserializer())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = command!()
        .arg(
            arg!(-c --config <CONFIG> "A TOML file with import options. Options given on the command line take precedence.")
                .value_parser(value_parser!(PathBuf))
        )
        .arg(arg!(--fps <FPS> "Output frame rate.").value_parser(value_parser!(f64)))
        .arg(
            arg!(--"asset-path" <ASSET_PATH> "Directory holding the skeleton manifests of the recorded models, in the game's folder layout.")
                .value_parser(value_parser!(PathBuf))
        )
        .arg(
            arg!(--interpolation <MODE> "Interpolation between keyframes: constant, linear or bezier.")
                .value_parser(parse_interpolation)
        )
        .arg(
            arg!(--"inter-key" "Add interpolated keyframes on every whole frame between recorded samples.")
                .action(ArgAction::SetTrue)
        )
        .arg(
            arg!(--"no-instancing" "Import each model's skeleton again for every entity instead of reusing it.")
                .action(ArgAction::SetTrue)
        )
        .arg(arg!(<INPUT_FILE> "The .agr or .cam recording to import.").value_parser(value_parser!(PathBuf)))
        .arg(arg!(<OUTPUT_FILE> "The JSON file to write the imported scene to.").value_parser(value_parser!(PathBuf)))
        .get_matches()
        ;

    let mut options = match matches.get_one::<PathBuf>("config") {
        Some(path) => ImportOptions::load(path).with_context(|| path.display().to_string())?,
        None => ImportOptions::default(),
    };
    if let Some(fps) = matches.get_one::<f64>("fps") {
        options.fps = *fps;
    }
    if let Some(asset_path) = matches.get_one::<PathBuf>("asset-path") {
        options.asset_path = asset_path.to_string_lossy().to_string();
    }
    if let Some(interpolation) = matches.get_one::<Interpolation>("interpolation") {
        options.interpolation = *interpolation;
    }
    if matches.get_flag("inter-key") {
        options.inter_key = true;
    }
    if matches.get_flag("no-instancing") {
        options.instancing = false;
    }
    options.validate()?;

    let Some(input_path) = matches.get_one::<PathBuf>("INPUT_FILE") else {
        bail!("No input file given");
    };
    let Some(output_path) = matches.get_one::<PathBuf>("OUTPUT_FILE") else {
        bail!("No output file given");
    };

    let extension = input_path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let scene = match extension.as_str() {
        "agr" => {
            let mut importer = TomlSkeletonImporter;
            GameRecordImporter::new(&options, &mut importer)
                .import_file(input_path)
                .context("Game record")?
        }
        "cam" => CamImporter::new(&options).import_file(input_path).context("Cam file")?,
        _ => bail!("Don't know how to import {}; expected a .agr or .cam file", input_path.display()),
    };

    let mut document = SceneDocument::new();
    scene.emit(&mut document)?;
    document.save(output_path).context("Output file")?;

    let report = &scene.report;
    log::info!(
        "Imported {} objects, frames {} - {}",
        scene.objects.len(),
        report.frame_start,
        report.frame_end
    );
    if report.frame_rate_mismatch.is_some() {
        log::warn!("Consider importing at the recording's frame rate instead of {} fps", options.fps);
    }
    if !report.failed_models.is_empty() {
        log::warn!("Models left out of the scene: {}", report.failed_models.join(", "));
    }

    Ok(())
}
