use std::time::Duration;

use egis_probe::usb::find_device;
use egis_probe::{Error, Result, SessionConfig};
use rusb::{Context, Device, Direction, TransferType};

const STRING_TIMEOUT: Duration = Duration::from_millis(500);

fn transfer_type_name(t: TransferType) -> &'static str {
    match t {
        TransferType::Control     => "CONTROL",
        TransferType::Isochronous => "ISOCHRONOUS",
        TransferType::Bulk        => "BULK",
        TransferType::Interrupt   => "INTERRUPT",
    }
}

fn direction_name(d: Direction) -> &'static str {
    match d {
        Direction::In  => "IN",
        Direction::Out => "OUT",
    }
}

fn version(v: rusb::Version) -> String {
    format!("{}.{}{}", v.major(), v.minor(), v.sub_minor())
}

pub fn device_info(context: &Context, config: &SessionConfig) -> Result<()> {
    let device = find_device(context, config.vendor_id, config.product_id)?;
    let descriptor = device.device_descriptor()?;

    println!("Device\tBus {:03} Device {:03}: ID {:04x}:{:04x}",
        device.bus_number(), device.address(), descriptor.vendor_id(), descriptor.product_id());
    println!("\tUSB {}, device version {}, class 0x{:02x}, max packet {}",
        version(descriptor.usb_version()), version(descriptor.device_version()),
        descriptor.class_code(), descriptor.max_packet_size());

    device_strings(&device, &descriptor);

    let active = device.active_config_descriptor().map_err(|source| match source {
        rusb::Error::Access => Error::PermissionDenied { interface: config.interface, source },
        e => Error::Usb(e),
    })?.number();

    for index in 0..descriptor.num_configurations() {
        let config_descriptor = device.config_descriptor(index)?;
        let marker = if config_descriptor.number() == active { " (active)" } else { "" };
        println!("Config {}{}\tinterfaces={}, max power={}mA",
            config_descriptor.number(), marker, config_descriptor.num_interfaces(), config_descriptor.max_power());

        for interface in config_descriptor.interfaces() {
            for setting in interface.descriptors() {
                println!("\tInterface {} alt {}\tclass=0x{:02x}, subclass=0x{:02x}, protocol=0x{:02x}",
                    setting.interface_number(), setting.setting_number(),
                    setting.class_code(), setting.sub_class_code(), setting.protocol_code());

                for endpoint in setting.endpoint_descriptors() {
                    println!("\t\tEndpoint 0x{:02x}\t{:3} {:11} max {:4} bytes, interval {}",
                        endpoint.address(),
                        direction_name(endpoint.direction()),
                        transfer_type_name(endpoint.transfer_type()),
                        endpoint.max_packet_size(),
                        endpoint.interval(),
                    );
                }
            }
        }
    }

    Ok(())
}

fn device_strings(device: &Device<Context>, descriptor: &rusb::DeviceDescriptor) {
    let handle = match device.open() {
        Ok(handle) => handle,
        Err(e) => {
            println!("\t(could not open device for strings: {e})");
            return;
        },
    };

    let language = match handle.read_languages(STRING_TIMEOUT) {
        Ok(languages) if !languages.is_empty() => languages[0],
        _ => {
            println!("\t(could not read device strings)");
            return;
        },
    };

    let show = |label: &str, value: rusb::Result<String>| {
        match value {
            Ok(s)  => println!("\t{label}: {s}"),
            Err(_) => println!("\t{label}: -"),
        }
    };

    show("Manufacturer", handle.read_manufacturer_string(language, descriptor, STRING_TIMEOUT));
    show("Product",      handle.read_product_string(language, descriptor, STRING_TIMEOUT));
    show("Serial",       handle.read_serial_number_string(language, descriptor, STRING_TIMEOUT));
}
