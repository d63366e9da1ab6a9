use stackmap::jvm::class_file::{ConstantsPool, Serialize, StackMapTable};
use stackmap::jvm::class_graph::{ClassData, ClassGraph, ClassGraphArenas, JavaClasses};
use stackmap::jvm::verifier::{stack_map_table, FrameTable, MarkerGenerator};
use stackmap::jvm::{BinaryName, ClassAccessFlags, Error, Name};
use stackmap::listing;

use clap::{Arg, ArgAction, Command};
use std::fs;

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("Stack map frame compressor")
        .version(clap::crate_version!())
        .about("Compute the StackMapTable entries for a listing of method frames")
        .arg(
            Arg::new("class")
                .long("class")
                .value_name("NAME=SUPER")
                .action(ArgAction::Append)
                .help("Declare a class and its superclass (eg. `foo/Bar=java/lang/Number`)"),
        )
        .arg(
            Arg::new("interface")
                .long("interface")
                .value_name("NAME")
                .action(ArgAction::Append)
                .help("Declare an interface"),
        )
        .arg(
            Arg::new("hex")
                .long("hex")
                .action(ArgAction::SetTrue)
                .help("Also print the encoded attribute and the constants it refers to"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the frame listing to use")
                .required(true)
                .index(1),
        )
        .get_matches();

    let class_graph_arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&class_graph_arenas);
    let java = class_graph.insert_java_library_types();
    for interface in matches.get_many::<String>("interface").into_iter().flatten() {
        add_interface(&class_graph, &java, interface)?;
    }
    for class in matches.get_many::<String>("class").into_iter().flatten() {
        add_class(&class_graph, class)?;
    }

    let input = matches
        .get_one::<String>("INPUT")
        .ok_or_else(|| Error::BadArgument(String::from("Missing input listing")))?;
    log::info!("Reading '{}'", input);
    let source = fs::read_to_string(input)?;

    let mut markers = MarkerGenerator::new();
    let listing = listing::parse_listing(&source, &mut markers)?;
    let mut table = FrameTable::new(listing.entry);
    for frame in listing.frames {
        table.record(frame, &class_graph)?;
    }

    let records = table.stack_map_records()?;
    log::info!("Computed {} stack map frames", records.len());
    for record in &records {
        println!("{}", listing::render_record(record));
    }

    if matches.get_flag("hex") {
        let mut constants = ConstantsPool::new();
        let attribute = stack_map_table(&records, &mut constants)?;
        println!("{}: {}", StackMapTable::NAME, hex(&attribute.to_bytes()?));
        println!("constant_pool: {}", hex(&constants.to_bytes()?));
    }

    Ok(())
}

fn parse_name(name: &str) -> Result<BinaryName, Error> {
    BinaryName::from_string(name.to_owned())
        .map_err(|_| Error::BadArgument(format!("Invalid class name '{}'", name)))
}

/// Add a `NAME=SUPER` class, whose superclass must already be known
fn add_class<'g>(class_graph: &'g ClassGraph<'g>, declaration: &str) -> Result<(), Error> {
    let (name, superclass) = declaration.split_once('=').ok_or_else(|| {
        Error::BadArgument(format!("Expected `NAME=SUPER`, but got '{}'", declaration))
    })?;
    let name = parse_name(name)?;
    let superclass_name = parse_name(superclass)?;

    if class_graph.lookup_class(&name).is_some() {
        return Err(Error::BadArgument(format!("Class {} is declared twice", name)));
    }
    let superclass = class_graph.lookup_class(&superclass_name).ok_or_else(|| {
        Error::BadArgument(format!(
            "Superclass {} of {} must be declared first",
            superclass_name, name
        ))
    })?;
    if superclass.is_interface() {
        return Err(Error::BadArgument(format!(
            "Superclass {} of {} is an interface",
            superclass_name, name
        )));
    }

    log::debug!("Declaring class {} extends {}", name, superclass_name);
    let access_flags = ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER;
    class_graph.add_class(ClassData::new(name, superclass, access_flags));
    Ok(())
}

fn add_interface<'g>(
    class_graph: &'g ClassGraph<'g>,
    java: &JavaClasses<'g>,
    declaration: &str,
) -> Result<(), Error> {
    let name = parse_name(declaration)?;
    if class_graph.lookup_class(&name).is_some() {
        return Err(Error::BadArgument(format!("Class {} is declared twice", name)));
    }

    log::debug!("Declaring interface {}", name);
    let access_flags =
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
    class_graph.add_class(ClassData::new(name, java.object, access_flags));
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}
