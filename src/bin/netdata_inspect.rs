//! Inspect or convert a saved net data file.
//!
//! Examples:
//!   netdata-inspect summary run.netdat
//!   netdata-inspect value run.netdat Hidden Act 7 -1
//!   netdata-inspect trace run.netdat Hidden 7
//!   netdata-inspect convert run.netdat run.netdat.lz4

use std::process;

use netdata::prelude::*;
use tracing::error;

fn usage() -> ! {
    eprintln!("netdata-inspect (reads files written by NetHistory::save_file)");
    eprintln!("Usage: netdata-inspect <command> <file> [args]\n");
    eprintln!("Commands:");
    eprintln!("  summary <file>                          Layers, variables and ranges");
    eprintln!("  value <file> <layer> <var> <unit> [rec] One value (rec -1 = latest)");
    eprintln!("  trace <file> <layer> <unit> [lane]      All unit variables over time");
    eprintln!("  convert <in> <out>                      Re-save (.lz4 output compresses)");
    process::exit(1);
}

fn parse_num<T: std::str::FromStr>(s: &str, what: &str) -> T {
    s.parse().unwrap_or_else(|_| {
        eprintln!("invalid {what}: {s}");
        process::exit(1);
    })
}

fn open(path: &str) -> NetHistory {
    NetHistory::open_file(path, HistoryConfig::default()).unwrap_or_else(|e| {
        error!(path, "failed to open net data: {e}");
        process::exit(1);
    })
}

fn fmt_value(v: Option<f32>) -> String {
    match v {
        Some(v) => format!("{v}"),
        None => "-".to_string(),
    }
}

fn summary(nh: &NetHistory) {
    println!(
        "records: {} / {}  lanes: {}",
        nh.len(),
        nh.ring().capacity(),
        nh.lanes()
    );
    if !nh.is_empty() {
        println!("oldest: {}", nh.counter_rec(0));
        println!("latest: {}", nh.counter_rec(-1));
    }

    println!("\nunit variables:");
    for name in nh.catalog().units().names() {
        match nh.var_range(VarRef::Unit(name)) {
            Some((lo, hi)) => println!("  {name:<16} [{lo}, {hi}]"),
            None => println!("  {name:<16} (no values)"),
        }
    }

    println!("\nlayers:");
    for ld in nh.units().layers() {
        println!("  {:<16} {} units", ld.name(), ld.shape().units);
    }

    if nh.synapses().is_empty() {
        return;
    }
    println!("\npathways:");
    for ls in nh.synapses().layers() {
        for pd in ls.send() {
            let key = pd.key();
            println!(
                "  {} -> {} ({}): {} synapses, vars {:?}",
                key.sender,
                key.receiver,
                key.kind,
                pd.synapse_count(),
                pd.vars()
            );
        }
    }
}

fn trace(nh: &mut NetHistory, layer: &str, unit: usize, lane: usize) {
    nh.select_unit(layer, unit);
    let Some(tr) = nh.selected_unit_trace(lane) else {
        eprintln!("no layer named {layer}");
        process::exit(1);
    };
    println!("rec\t{}\tcounters", tr.vars.join("\t"));
    for row in &tr.rows {
        let values: Vec<String> = row.values.iter().map(|v| fmt_value(*v)).collect();
        println!("{}\t{}\t{}", row.record, values.join("\t"), row.counters);
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        usage();
    }

    match args[0].as_str() {
        "summary" => summary(&open(&args[1])),
        "value" => {
            if args.len() < 5 {
                usage();
            }
            let nh = open(&args[1]);
            let unit: usize = parse_num(&args[4], "unit");
            let record: isize = args.get(5).map_or(-1, |s| parse_num(s, "record"));
            let v = nh.unit_value(&args[2], VarRef::parse(&args[3]), unit, record, 0);
            println!("{}", fmt_value(v));
        }
        "trace" => {
            if args.len() < 4 {
                usage();
            }
            let mut nh = open(&args[1]);
            let unit: usize = parse_num(&args[3], "unit");
            let lane: usize = args.get(4).map_or(0, |s| parse_num(s, "lane"));
            trace(&mut nh, &args[2], unit, lane);
        }
        "convert" => {
            if args.len() < 3 {
                usage();
            }
            let nh = open(&args[1]);
            if let Err(e) = nh.save_file(&args[2]) {
                error!(path = %args[2], "failed to save net data: {e}");
                process::exit(1);
            }
        }
        other => {
            eprintln!("unknown command: {other}");
            usage();
        }
    }
}
