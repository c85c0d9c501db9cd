use accessorgen::accessor::{
    self, AccessorLoader, ClassImageAssembler, DirectoryLoader, MemberDescriptor, Settings,
    SymbolAllocator,
};
use accessorgen::jvm::{BinaryName, MethodDescriptor, Name, ParseDescriptor, UnqualifiedName};

use clap::{Arg, ArgAction, ArgMatches, Command};

fn main() -> Result<(), accessor::Error> {
    env_logger::init();

    let matches = cli().get_matches();

    let member = member_from_matches(&matches)?;
    let settings = Settings::new(required(&matches, "package")?)?;
    let kind = member.accessor_kind();

    log::info!(
        "Generating {:?} accessor for {}.{}",
        kind,
        member.owner(),
        member.name().as_str()
    );
    let allocator = SymbolAllocator::global();
    let image = ClassImageAssembler::new(&member, kind)?
        .with_settings(settings)
        .with_allocator(allocator)
        .assemble()?;

    let loader = DirectoryLoader::new(required(&matches, "output")?);
    let path = loader.define(&image, &())?;
    println!("{}", path.display());

    Ok(())
}

fn cli() -> Command {
    Command::new("Accessor class generator")
    .version(clap::crate_version!())
    .author("Alec Theriault <alec.theriault@gmail.com>")
    .about("Generate JVM classes that call a method or constructor without reflection")
    .arg(
        Arg::new("owner")
            .long("owner")
            .value_name("CLASS_NAME")
            .required(true)
            .help("Class declaring the member (eg. `java/lang/String`)"),
    )
    .arg(
        Arg::new("name")
            .long("name")
            .value_name("METHOD_NAME")
            .help("Name of the method (not needed for constructors)"),
    )
    .arg(
        Arg::new("descriptor")
            .long("descriptor")
            .value_name("DESCRIPTOR")
            .required(true)
            .help("Method descriptor of the member (eg. `(Ljava/lang/String;I)V`)"),
    )
    .arg(
        Arg::new("kind")
            .long("kind")
            .value_parser(["method", "static", "constructor", "serialization"])
            .default_value("method")
            .help("Sort of member to call"),
    )
    .arg(
        Arg::new("target")
            .long("target")
            .value_name("CLASS_NAME")
            .help("Class whose constructor a serialization constructor runs"),
    )
    .arg(
        Arg::new("interface")
            .long("interface")
            .action(ArgAction::SetTrue)
            .help("The owner is an interface"),
    )
    .arg(
        Arg::new("throws")
            .long("throws")
            .value_name("CLASS_NAME")
            .action(ArgAction::Append)
            .help("Checked exception declared by the member (repeatable)"),
    )
    .arg(
        Arg::new("package")
            .long("package")
            .value_name("PACKAGE_PREFIX")
            .default_value(Settings::DEFAULT_PACKAGE_PREFIX)
            .help("Package of the generated class, with a trailing `/`"),
    )
    .arg(
        Arg::new("output")
            .long("output-dir")
            .value_name("DIRECTORY")
            .default_value(".")
            .help(
                "Directory under which class files are written (names restart at 1 on \
                 every run, so existing accessors there are overwritten)",
            ),
    )
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str, accessor::Error> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| accessor::Error::MalformedName(format!("Missing argument `{}`", id)))
}

fn class_name(name: &str) -> Result<BinaryName, accessor::Error> {
    BinaryName::from_string(name.to_owned()).map_err(accessor::Error::MalformedName)
}

fn member_from_matches(matches: &ArgMatches) -> Result<MemberDescriptor, accessor::Error> {
    let owner = class_name(required(matches, "owner")?)?;
    let descriptor = MethodDescriptor::parse(required(matches, "descriptor")?)
        .map_err(|err| accessor::Error::UnsupportedDescriptor(err.to_string()))?;

    let method_name = || -> Result<UnqualifiedName, accessor::Error> {
        let name = required(matches, "name")?;
        UnqualifiedName::from_string(name.to_owned()).map_err(accessor::Error::MalformedName)
    };
    let constructor_parameters = |descriptor: MethodDescriptor| {
        if descriptor.return_type.is_some() {
            Err(accessor::Error::UnsupportedDescriptor(String::from(
                "Constructors must return `V`",
            )))
        } else {
            Ok(descriptor.parameters)
        }
    };

    let member = match required(matches, "kind")? {
        "static" => MemberDescriptor::static_method(owner, method_name()?, descriptor)?,
        "constructor" => {
            MemberDescriptor::constructor(owner, constructor_parameters(descriptor)?)?
        }
        "serialization" => {
            let target = class_name(required(matches, "target")?)?;
            MemberDescriptor::serialization_constructor(
                owner,
                target,
                constructor_parameters(descriptor)?,
            )?
        }
        _ => MemberDescriptor::instance_method(owner, method_name()?, descriptor)?,
    };

    let member = if matches.get_flag("interface") {
        member.with_interface_owner()?
    } else {
        member
    };

    let exceptions = matches
        .get_many::<String>("throws")
        .into_iter()
        .flatten()
        .map(String::as_str)
        .map(class_name)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(member.with_exceptions(exceptions))
}
