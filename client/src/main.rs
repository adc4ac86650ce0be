/*
 * SPDX-FileCopyrightText: Copyright (c) 2022 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: MIT
 *
 * Permission is hereby granted, free of charge, to any person obtaining a
 * copy of this software and associated documentation files (the "Software"),
 * to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense,
 * and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in
 * all copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL
 * THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
 * FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
 * DEALINGS IN THE SOFTWARE.
 */

/* Lenovo Redfish command line client
 *
 * USAGE: ./lenovo-redfish-client -H 10.245.39.153 -U USERID -P PASSW0RD -c get_cpu_inventory
 * Connection settings may also come from a TOML file given with --config,
 * command line values win over the file.
 * Run with no params for help.
 * Run with `-v` for more output.
 */

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{anyhow, Context};
use lenovo_redfish::{
    BiosAttributeSource, Client, Config, ConnectConfig, FileServerConfig, FirmwareRole,
    FirmwareUpdate, FixIdUpdate, JsonObject, RedfishError, SystemPowerControl, TransferProtocol,
    UpdateOutcome,
};
use serde_json::{json, Value};
use tracing::{debug, error};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;

/// Everything a command handler gets: a logged in client, the parsed
/// command line and the file server settings.
struct Invocation {
    client: Client,
    args: getopts::Matches,
    file_server: FileServerConfig,
}

impl Invocation {
    fn opt(&self, name: &str) -> Option<String> {
        self.args.opt_str(name).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, RedfishError> {
        self.opt(name)
            .ok_or_else(|| RedfishError::InvalidArgument(format!("--{name} is required")))
    }
}

type Handler = fn(&Invocation) -> Result<Value, RedfishError>;

struct Command {
    name: &'static str,
    help: &'static str,
    run: Handler,
}

static COMMANDS: &[Command] = &[
    Command {
        name: "get_cpu_inventory",
        help: "Installed processors",
        run: |i| Ok(objects(i.client.get_cpu_inventory()?)),
    },
    Command {
        name: "get_memory_inventory",
        help: "Installed DIMMs, or one DIMM with --member-id",
        run: |i| {
            let member = i.opt("member-id");
            Ok(objects(i.client.get_memory_inventory(member.as_deref())?))
        },
    },
    Command {
        name: "get_system_ethernet_interfaces",
        help: "Ethernet interfaces seen by the host",
        run: |i| Ok(objects(i.client.get_system_ethernet_interfaces()?)),
    },
    Command {
        name: "get_system_storage",
        help: "Storage subsystems with drives, volumes and controllers",
        run: |i| Ok(objects(i.client.get_system_storage()?)),
    },
    Command {
        name: "get_system_simple_storage",
        help: "SimpleStorage controllers",
        run: |i| Ok(objects(i.client.get_system_simple_storage()?)),
    },
    Command {
        name: "get_storage_inventory",
        help: "Storage and SimpleStorage together",
        run: |i| Ok(Value::Object(i.client.get_storage_inventory()?)),
    },
    Command {
        name: "get_power_state",
        help: "Host power state",
        run: |i| Ok(Value::Object(i.client.get_system_power_state()?)),
    },
    Command {
        name: "get_system_inventory",
        help: "System summary with its ethernet interfaces",
        run: |i| Ok(Value::Object(i.client.get_system_inventory()?)),
    },
    Command {
        name: "get_all_bios_attributes",
        help: "BIOS attributes, --bios-get current (default) or pending",
        run: |i| {
            let source: BiosAttributeSource = i
                .opt("bios-get")
                .as_deref()
                .unwrap_or("current")
                .parse()?;
            Ok(Value::Object(i.client.get_all_bios_attributes(source)?))
        },
    },
    Command {
        name: "get_bios_attribute",
        help: "One BIOS attribute, --attribute NAME",
        run: |i| Ok(Value::Object(i.client.get_bios_attribute(&i.required("attribute")?)?)),
    },
    Command {
        name: "get_bios_bootmode",
        help: "BIOS boot mode",
        run: |i| Ok(Value::Object(i.client.get_bios_bootmode()?)),
    },
    Command {
        name: "get_bios_attribute_registry",
        help: "BIOS attribute registry",
        run: |i| Ok(Value::Object(i.client.get_bios_attribute_registry()?)),
    },
    Command {
        name: "set_bios_attribute",
        help: "Set a BIOS attribute, --attribute NAME --value VALUE",
        run: |i| {
            let message = i
                .client
                .set_bios_attribute(&i.required("attribute")?, &i.required("value")?)?;
            Ok(json!({ "message": message }))
        },
    },
    Command {
        name: "set_power_state",
        help: "Reset the host, --reset-type On|ForceOff|GracefulShutdown|...",
        run: |i| {
            let reset_type: SystemPowerControl = i.required("reset-type")?.parse()?;
            Ok(json!({ "message": i.client.set_system_power(reset_type)? }))
        },
    },
    Command {
        name: "get_bmc_inventory",
        help: "Manager with its interfaces",
        run: |i| Ok(Value::Object(i.client.get_bmc_inventory()?)),
    },
    Command {
        name: "get_bmc_networkprotocol",
        help: "Manager network protocol settings",
        run: |i| Ok(Value::Object(i.client.get_bmc_networkprotocol()?)),
    },
    Command {
        name: "get_bmc_serialinterfaces",
        help: "Manager serial interfaces",
        run: |i| Ok(objects(i.client.get_bmc_serialinterfaces()?)),
    },
    Command {
        name: "get_bmc_ethernet_interfaces",
        help: "Manager ethernet interfaces",
        run: |i| Ok(objects(i.client.get_bmc_ethernet_interfaces()?)),
    },
    Command {
        name: "get_bmc_virtual_media",
        help: "Manager virtual media",
        run: |i| Ok(objects(i.client.get_bmc_virtual_media()?)),
    },
    Command {
        name: "get_bmc_hostinterfaces",
        help: "Manager host interfaces",
        run: |i| Ok(objects(i.client.get_bmc_hostinterfaces()?)),
    },
    Command {
        name: "get_bmc_ntp",
        help: "Manager NTP settings",
        run: |i| i.client.get_bmc_ntp(),
    },
    Command {
        name: "get_pci_inventory",
        help: "PCIe devices with their functions",
        run: |i| Ok(objects(i.client.get_pci_inventory()?)),
    },
    Command {
        name: "get_nic_inventory",
        help: "Network adapters with functions and ports",
        run: |i| Ok(objects(i.client.get_nic_inventory()?)),
    },
    Command {
        name: "get_fan_inventory",
        help: "Fans",
        run: |i| Ok(objects(i.client.get_fan_inventory()?)),
    },
    Command {
        name: "get_temperatures_inventory",
        help: "Temperature sensors",
        run: |i| Ok(objects(i.client.get_temperatures_inventory()?)),
    },
    Command {
        name: "get_psu_inventory",
        help: "Power supplies",
        run: |i| Ok(objects(i.client.get_psu_inventory()?)),
    },
    Command {
        name: "get_power_redundancy",
        help: "Power redundancy groups",
        run: |i| Ok(objects(i.client.get_power_redundancy()?)),
    },
    Command {
        name: "get_power_voltages",
        help: "Voltage sensors",
        run: |i| Ok(objects(i.client.get_power_voltages()?)),
    },
    Command {
        name: "get_power_metrics",
        help: "Chassis power consumption",
        run: |i| i.client.get_power_metrics(),
    },
    Command {
        name: "get_power_limit",
        help: "Chassis power limit",
        run: |i| i.client.get_power_limit(),
    },
    Command {
        name: "get_firmware_inventory",
        help: "Firmware inventory",
        run: |i| Ok(objects(i.client.get_firmware_inventory()?)),
    },
    Command {
        name: "update_firmware",
        help: "Flash --image, pushed (HTTPPUSH) or pulled by the BMC (SFTP, TFTP)",
        run: update_firmware,
    },
    Command {
        name: "update_firmware_by_fixid",
        help: "Flash the UpdateXpress package --fixid found in --localpath",
        run: update_firmware_by_fixid,
    },
];

fn objects(v: Vec<JsonObject>) -> Value {
    Value::Array(v.into_iter().map(Value::Object).collect())
}

fn outcome(outcome: UpdateOutcome) -> Value {
    match outcome {
        UpdateOutcome::Completed { message } => json!({ "message": message }),
        UpdateOutcome::AwaitingBmcRestart { message, task_uri } => {
            json!({ "message": message, "task": task_uri })
        }
    }
}

fn protocol(i: &Invocation, default: TransferProtocol) -> Result<TransferProtocol, RedfishError> {
    match &i.file_server.protocol {
        Some(p) => Ok(p.parse()?),
        None => Ok(default),
    }
}

fn update_firmware(i: &Invocation) -> Result<Value, RedfishError> {
    let request = FirmwareUpdate {
        image: i.required("image")?,
        target: i.opt("target"),
        protocol: protocol(i, TransferProtocol::HttpPush)?,
        fs_ip: i.file_server.host(),
        fs_dir: i.file_server.dir.clone(),
        fs_username: i.file_server.username.clone(),
        fs_password: i.file_server.password.clone(),
    };
    Ok(outcome(i.client.update_firmware(&request)?))
}

fn update_firmware_by_fixid(i: &Invocation) -> Result<Value, RedfishError> {
    let firmware_role = match i.opt("firmware-role") {
        Some(role) => role.parse()?,
        None => FirmwareRole::Primary,
    };
    let fs_ip = i
        .file_server
        .host()
        .ok_or_else(|| RedfishError::InvalidArgument("--fsip is required".to_string()))?;
    let request = FixIdUpdate {
        fixid: i.required("fixid")?,
        local_path: PathBuf::from(i.required("localpath")?),
        firmware_role,
        protocol: protocol(i, TransferProtocol::SFTP)?,
        fs_ip,
        fs_username: i.file_server.username.clone(),
        fs_password: i.file_server.password.clone(),
        fs_dir: i.file_server.dir.clone(),
    };
    Ok(outcome(i.client.update_firmware_by_fixid(&request)?))
}

fn command_list() -> String {
    COMMANDS
        .iter()
        .map(|c| format!("    {:<32}{}", c.name, c.help))
        .collect::<Vec<_>>()
        .join("\n")
}

fn options() -> getopts::Options {
    let mut opts = getopts::Options::new();
    opts.optflag("h", "help", "Print this help");
    opts.optflag("v", "verbose", "Log at DEBUG level. Default is INFO");
    opts.optopt("H", "hostname", "Hostname or IP address of the BMC", "HOST");
    opts.optopt("U", "username", "BMC username", "USER");
    opts.optopt("P", "password", "BMC password", "PASS");
    opts.optopt("", "port", "BMC HTTPS port", "PORT");
    opts.optopt("", "auth", "session (default) or basic", "AUTH");
    opts.optopt("", "cafile", "CA certificate of the BMC", "FILE");
    opts.optopt("", "config", "TOML configuration file", "FILE");
    opts.optopt("", "log-file", "Also write the log to FILE", "FILE");
    opts.optopt("c", "cmd", "Command to run, see the list below", "CMD");
    opts.optopt("", "image", "Firmware image file name", "IMAGE");
    opts.optopt("", "target", "Update target: BMC-Backup (XCC), BMC or UEFI (TSM)", "TARGET");
    opts.optopt("", "fsprotocol", "HTTPPUSH, SFTP or TFTP", "PROTO");
    opts.optopt("", "fsip", "File server address", "IP");
    opts.optopt("", "fsport", "File server port", "PORT");
    opts.optopt("", "fsdir", "Image directory, local or on the file server", "DIR");
    opts.optopt("", "fsusername", "File server username", "USER");
    opts.optopt("", "fspassword", "File server password", "PASS");
    opts.optopt("", "member-id", "Member id, e.g. a DIMM", "ID");
    opts.optopt("", "attribute", "BIOS attribute name", "NAME");
    opts.optopt("", "value", "BIOS attribute value", "VALUE");
    opts.optopt("", "bios-get", "current or pending", "SOURCE");
    opts.optopt("", "reset-type", "System reset type", "TYPE");
    opts.optopt("", "fixid", "UpdateXpress fix id", "FIXID");
    opts.optopt("", "localpath", "Directory holding the fix id xml files", "DIR");
    opts.optopt("", "firmware-role", "Primary (default) or Backup", "ROLE");
    opts
}

// init_logging returns the file writer guard, which must outlive main.
fn init_logging(
    verbose: bool,
    log_file: Option<PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, anyhow::Error> {
    let log_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let env_filter = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive("hyper=warn".parse()?);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("--log-file {} is not a file", path.display()))?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(Layer::default().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(Layer::default().compact().with_writer(std::io::stderr))
        .with(file_layer)
        .with(env_filter)
        .init();
    Ok(guard)
}

fn run() -> Result<ExitCode, anyhow::Error> {
    let args: Vec<String> = std::env::args().collect();
    let opts = options();
    let args_given = opts.parse(&args[1..])?;
    let usage = || {
        format!(
            "{}\nCommands:\n{}",
            opts.usage("lenovo-redfish-client -H bmc_ip -U bmc_user -P bmc_pass -c cmd"),
            command_list()
        )
    };
    if args_given.opt_present("h") || !args_given.opt_present("c") {
        eprintln!("{}", usage());
        return Ok(ExitCode::SUCCESS);
    }

    let _guard = init_logging(
        args_given.opt_present("v"),
        args_given.opt_str("log-file").map(PathBuf::from),
    )?;

    let cmd = args_given.opt_str("c").unwrap_or_default();
    let Some(command) = COMMANDS.iter().find(|c| c.name == cmd) else {
        eprintln!("Unsupported command {cmd}.\nCommands:\n{}", command_list());
        return Ok(ExitCode::FAILURE);
    };

    let config = match args_given.opt_str("config") {
        Some(path) => Config::load(Path::new(&path))
            .with_context(|| format!("Failed to load configuration {path}"))?,
        None => Config::default(),
    };
    let flag = |name: &str| args_given.opt_str(name).filter(|v| !v.is_empty());
    let port = flag("port")
        .map(|p| p.parse::<u16>())
        .transpose()
        .context("--port must be a number")?;
    let fs_port = flag("fsport")
        .map(|p| p.parse::<u16>())
        .transpose()
        .context("--fsport must be a number")?;
    let file_server = config.file_server.merge(FileServerConfig {
        protocol: flag("fsprotocol"),
        ip: flag("fsip"),
        port: fs_port,
        username: flag("fsusername"),
        password: flag("fspassword"),
        dir: flag("fsdir"),
    });
    let connect = config.connect.merge(ConnectConfig {
        bmc_ip: args_given.opt_str("H"),
        port,
        username: args_given.opt_str("U"),
        password: args_given.opt_str("P"),
        cafile: args_given.opt_str("cafile").map(PathBuf::from),
        auth: args_given.opt_str("auth"),
        ..Default::default()
    });
    debug!("Running {} against {:?}", command.name, connect.bmc_ip);

    let mut client = lenovo_redfish::new(&connect)?;
    if let Err(e) = client.login() {
        eprintln!("{e}");
        return Ok(ExitCode::FAILURE);
    }
    let invocation = Invocation {
        client,
        args: args_given,
        file_server,
    };
    let result = (command.run)(&invocation);
    let mut client = invocation.client;
    client.logout();

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{} failed. {e}", command.name);
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
