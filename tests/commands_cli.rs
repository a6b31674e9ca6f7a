use clap::Parser;
use clap::error::ErrorKind;
use pretty_assertions::assert_eq;

const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
const ESF551_FRAME: &str = "A5 02 00 10 00 00 01 61 A1 00 52 1B 01 00 02 00 00 00 00 01 01 00";

#[derive(Debug, Default)]
struct FakeTerminalClient;

impl esf::TerminalClient for FakeTerminalClient {
    fn stdout_is_terminal(&self) -> bool {
        false
    }

    fn stderr_is_terminal(&self) -> bool {
        false
    }
}

async fn run_with_parsed_args(
    args: esf::Args,
    output_format: esf::OutputFormat,
) -> anyhow::Result<String> {
    let mut output = Vec::new();
    let log_level = args.log_level();
    let (command, maybe_fake_args) = args.into_command_and_fake_args()?;
    esf::run_with_clients(
        command,
        &mut output,
        &FakeTerminalClient,
        esf::TransportBackend::from_fake_args(maybe_fake_args),
        log_level,
        output_format,
    )
    .await?;
    Ok(String::from_utf8(output)?)
}

async fn run_with_argv<const N: usize>(
    argv: [&str; N],
    output_format: esf::OutputFormat,
) -> anyhow::Result<String> {
    let parsed_args = esf::Args::try_parse_from(argv)?;
    run_with_parsed_args(parsed_args, output_format).await
}

#[tokio::test]
async fn decode_command_prints_esf551_measurement() -> anyhow::Result<()> {
    let stdout = run_with_argv(["esf", "decode", ESF551_FRAME], esf::OutputFormat::Pretty).await?;

    assert!(stdout.starts_with("Decoded frame:"));
    for expected in ["esf551", "measurement", "72.53 kg", "512 Ω", "kg"] {
        assert!(stdout.contains(expected), "missing {expected}:\n{stdout}");
    }
    Ok(())
}

#[tokio::test]
async fn decode_command_emits_json_for_esf24() -> anyhow::Result<()> {
    let decode = esf::DecodeArgs::builder()
        .model(esf::ScaleModel::Esf24)
        .payload("14 0B 15 00 00 00 00 00 00 00 00")?
        .build();
    let args = esf::Args::new(esf::Command::Decode(decode));

    let stdout = run_with_parsed_args(args, esf::OutputFormat::Json).await?;
    let value: serde_json::Value = serde_json::from_str(stdout.trim_end())?;
    assert_eq!(
        serde_json::json!({
            "model": "esf24",
            "payload": "14 0B 15 00 00 00 00 00 00 00 00",
            "frame": "measurement_request",
        }),
        value
    );
    Ok(())
}

#[test]
fn decode_command_rejects_invalid_hex() {
    let error = esf::Args::try_parse_from(["esf", "decode", "A5 0"])
        .expect_err("odd-length hex should fail");
    assert_eq!(ErrorKind::ValueValidation, error.kind());
}

#[tokio::test]
async fn metrics_command_prints_reading_table() -> anyhow::Result<()> {
    let stdout = run_with_argv(
        [
            "esf",
            "metrics",
            "--weight",
            "75",
            "--height",
            "1.8",
            "--age",
            "30",
            "--sex",
            "male",
            "--impedance",
            "500",
        ],
        esf::OutputFormat::Pretty,
    )
    .await?;

    for expected in [
        "weight",
        "75 kg",
        "500 Ω",
        "body_mass_index",
        "23.15",
        "body_fat_percentage",
        "health_score",
    ] {
        assert!(stdout.contains(expected), "missing {expected}:\n{stdout}");
    }
    Ok(())
}

#[tokio::test]
async fn metrics_command_rejects_height_out_of_range() {
    let result = run_with_argv(
        [
            "esf", "metrics", "--weight", "75", "--height", "3.1", "--age", "30", "--sex",
            "female",
        ],
        esf::OutputFormat::Json,
    )
    .await;

    let error = result.expect_err("height above range");
    assert!(matches!(
        error.downcast_ref::<esf::ConfigError>(),
        Some(esf::ConfigError::InvalidHeight { .. })
    ));
}

#[test]
fn metrics_command_rejects_age_out_of_range() {
    let error = esf::Args::try_parse_from([
        "esf", "metrics", "--weight", "75", "--height", "1.8", "--age", "0", "--sex", "male",
    ])
    .expect_err("age zero should fail");
    assert_eq!(ErrorKind::ValueValidation, error.kind());
}

#[tokio::test]
async fn listen_command_prints_measurements_from_fake_scale() -> anyhow::Result<()> {
    let fake = esf::FakeArgs::builder()
        .scan_fixture(&format!("11:22:33:44:55:66|Other;{ADDRESS}|Etekcity Fitness Scale"))?
        .notifications(ESF551_FRAME)?
        .hw_version("HW-1")
        .sw_version("1.0.3")
        .build();
    let listen = esf::ListenArgs::builder()
        .address(ADDRESS)
        .max_results(1)
        .build();
    let args = esf::Args::new(esf::Command::Listen(listen)).with_fake(fake);

    let stdout = run_with_parsed_args(args, esf::OutputFormat::Pretty).await?;

    assert!(stdout.starts_with("Waiting for scale:"));
    for expected in [
        "Measurement #1:",
        "Etekcity Fitness Scale",
        "HW-1",
        "1.0.3",
        "72.53 kg",
        "Received 1 measurement (reached limit of 1)",
    ] {
        assert!(stdout.contains(expected), "missing {expected}:\n{stdout}");
    }
    Ok(())
}

#[tokio::test]
async fn listen_command_streams_json_lines() -> anyhow::Result<()> {
    let stdout = run_with_argv(
        [
            "esf",
            "--fake",
            "--fake-scan",
            "aa:bb:cc:dd:ee:ff|-",
            "--fake-notifications",
            ESF551_FRAME,
            "listen",
            "--address",
            ADDRESS,
            "--sex",
            "female",
            "--birthdate",
            "1990-03-14",
            "--height",
            "1.65",
            "--max-results",
            "1",
        ],
        esf::OutputFormat::Json,
    )
    .await?;

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(1, lines.len(), "{stdout}");
    let value: serde_json::Value = serde_json::from_str(lines[0])?;
    assert_eq!(Some("aa:bb:cc:dd:ee:ff"), value["address"].as_str());
    assert!(value["name"].is_null());
    assert_eq!(Some("kg"), value["display_unit"].as_str());
    assert_eq!(Some(72.53), value["reading"]["weight"].as_f64());
    assert!(value["reading"]["body_fat_percentage"].is_f64());
    Ok(())
}

#[tokio::test]
async fn listen_command_times_out_without_scale() -> anyhow::Result<()> {
    let stdout = run_with_argv(
        [
            "esf",
            "--fake",
            "--fake-scan",
            "11:22:33:44:55:66|Other",
            "listen",
            "--address",
            ADDRESS,
            "--listen-for",
            "50ms",
        ],
        esf::OutputFormat::Pretty,
    )
    .await?;

    assert!(
        stdout.contains("Received 0 measurements (listen time elapsed)"),
        "{stdout}"
    );
    Ok(())
}

#[test]
fn fake_fixture_errors_surface_from_builder() {
    let result = esf::FakeArgs::builder().scan_fixture("missing-name-field");
    assert!(matches!(
        result,
        Err(esf::FixtureError::InvalidRecordFieldCount)
    ));
}
