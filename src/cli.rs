use std::net;
use std::sync::Arc;

use clap::{Arg, ArgMatches, Command};
use rustyline::{
    Completer, CompletionType, Config, Editor, Helper, Highlighter, Hinter, Validator,
};

use crate::router::Router;
use crate::{util, DEFAULT_COST, DEFAULT_HELLO_INTERVAL, DEFAULT_PRIORITY};

lazy_static::lazy_static! {

    static ref INTERFACE_ADD_COMMAND : Command = Command::new("add")
    .about("Attach an interface to an area")
    .arg(Arg::new("interface").help("Interface number").required(true))
    .arg(Arg::new("area").help("Area id").required(true))
    .arg(Arg::new("link-local").help("Link-local address").required(true))
    .arg(Arg::new("cost").help("Interface cost"))
    .arg(Arg::new("priority").help("Election priority"));
    static ref INTERFACE_ADDRESS_COMMAND : Command = Command::new("address")
    .about("Configure a routable address")
    .arg(Arg::new("interface").help("Interface number").required(true))
    .arg(Arg::new("prefix").help("Address as addr/len").required(true));
    static ref INTERFACE_COST_COMMAND : Command = Command::new("cost")
    .about("Change interface cost")
    .arg(Arg::new("interface").help("Interface number").required(true))
    .arg(Arg::new("cost").help("New cost").required(true));
    static ref INTERFACE_DOWN_COMMAND : Command = Command::new("down")
    .about("Interface down")
    .arg(Arg::new("interface").help("Interface number").required(true));
    static ref INTERFACE_COMMAND : Command = Command::new("interface")
    .about("Interface commands")
    .subcommand(INTERFACE_ADD_COMMAND.clone())
    .subcommand(INTERFACE_ADDRESS_COMMAND.clone())
    .subcommand(INTERFACE_COST_COMMAND.clone())
    .subcommand(INTERFACE_DOWN_COMMAND.clone());
    static ref DISPLAY_COMMAND : Command = Command::new("display")
    .about("Display router state")
    .arg(Arg::new("what").help("lsdb | routes | graph | neighbors").required(true));
    static ref EXIT_COMMAND : Command = Command::new("exit")
    .about("Exit the ospf cli");
    static ref OSPF_COMMAND : Command = Command::new("ospf")
    .version("1.0")
    .about("OSPF CLI")
    .subcommand(INTERFACE_COMMAND.clone())
    .subcommand(DISPLAY_COMMAND.clone())
    .subcommand(EXIT_COMMAND.clone());

}

#[derive(Helper, Hinter, Validator, Highlighter, Completer)]
struct OspfHelper;

async fn match_ospf_command(router: &Arc<Router>, line: &str) {
    match OSPF_COMMAND
        .clone()
        .try_get_matches_from(line.split_whitespace())
    {
        Ok(matches) => {
            if let Some(sub_command_matches) = matches.subcommand_matches("interface") {
                match_interface_subcommand(router, sub_command_matches).await;
            } else if let Some(sub_command_matches) = matches.subcommand_matches("display") {
                match_display_command(router, sub_command_matches).await;
            } else if matches.subcommand_matches("exit").is_some() {
                router.shutdown().await;
                println!("Bye");
                std::process::exit(0);
            } else {
                OSPF_COMMAND
                    .clone()
                    .print_help()
                    .expect("print ospf command help failed");
            }
        }
        Err(err) => {
            err.print().expect("print err error");
        }
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Option<&'a String> {
    matches.get_one::<String>(name)
}

async fn match_display_command(router: &Arc<Router>, args_match: &ArgMatches) {
    match required(args_match, "what").map(|s| s.as_str()) {
        Some("lsdb") => print!("{}", router.dump_lsdb().await),
        Some("routes") => print!("{}", router.dump_routes().await),
        Some("graph") => print!("{}", router.dump_graph().await),
        Some("neighbors") => print!("{}", router.dump_neighbors().await),
        _ => util::error("display what? lsdb | routes | graph | neighbors"),
    }
}

async fn match_interface_subcommand(router: &Arc<Router>, args_match: &ArgMatches) {
    if let Some(sub_command_matches) = args_match.subcommand_matches("add") {
        let number = required(sub_command_matches, "interface")
            .and_then(|s| s.parse::<u32>().ok());
        let area = required(sub_command_matches, "area")
            .and_then(|s| s.parse::<net::Ipv4Addr>().ok());
        let link_local = required(sub_command_matches, "link-local")
            .and_then(|s| s.parse::<net::Ipv6Addr>().ok());
        let cost = required(sub_command_matches, "cost")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_COST);
        let priority = required(sub_command_matches, "priority")
            .and_then(|s| s.parse::<u8>().ok())
            .unwrap_or(DEFAULT_PRIORITY);
        match (number, area, link_local) {
            (Some(number), Some(area), Some(link_local)) => {
                router
                    .add_interface(
                        number,
                        area,
                        link_local,
                        cost,
                        priority,
                        DEFAULT_HELLO_INTERVAL,
                        DEFAULT_HELLO_INTERVAL * 4,
                    )
                    .await;
            }
            _ => util::error("usage: interface add <number> <area> <link-local> [cost] [priority]"),
        }
    } else if let Some(sub_command_matches) = args_match.subcommand_matches("address") {
        let number = required(sub_command_matches, "interface")
            .and_then(|s| s.parse::<u32>().ok());
        let prefix = required(sub_command_matches, "prefix")
            .and_then(|s| parse_prefix(s));
        match (number, prefix) {
            (Some(number), Some((address, length))) => {
                router.set_interface_address(number, address, length).await;
            }
            _ => util::error("usage: interface address <number> <addr/len>"),
        }
    } else if let Some(sub_command_matches) = args_match.subcommand_matches("cost") {
        let number = required(sub_command_matches, "interface")
            .and_then(|s| s.parse::<u32>().ok());
        let cost = required(sub_command_matches, "cost")
            .and_then(|s| s.parse::<u16>().ok());
        match (number, cost) {
            (Some(number), Some(cost)) => router.change_interface_cost(number, cost).await,
            _ => util::error("usage: interface cost <number> <cost>"),
        }
    } else if let Some(sub_command_matches) = args_match.subcommand_matches("down") {
        match required(sub_command_matches, "interface").and_then(|s| s.parse::<u32>().ok()) {
            Some(number) => {
                router.shutdown_interface(number).await;
            }
            None => util::error("usage: interface down <number>"),
        }
    } else {
        INTERFACE_COMMAND
            .clone()
            .print_help()
            .expect("print interface command help failed");
    }
}

fn parse_prefix(input: &str) -> Option<(net::Ipv6Addr, u8)> {
    let (address, length) = input.split_once('/')?;
    Some((address.parse().ok()?, length.parse().ok()?))
}

pub async fn cli(router: Arc<Router>) -> Result<(), Box<dyn std::error::Error>> {
    let cmdline_config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();
    let cmdline_helper = OspfHelper;
    let mut cmdline_editor = Editor::<OspfHelper, _>::with_config(cmdline_config)?;
    cmdline_editor.set_helper(Some(cmdline_helper));
    loop {
        let readline = cmdline_editor.readline(&format!("{}>>", router.router_id));
        if let Ok(line) = readline {
            cmdline_editor.add_history_entry(line.as_str())?;
            match_ospf_command(&router, &line).await;
        } else {
            router.shutdown().await;
            println!("Bye");
            std::process::exit(0);
        }
    }
}
