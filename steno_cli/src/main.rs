use std::{
    error::Error,
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
};

use clap::Parser;
use steno_core::{DictionaryStack, Filter, Outline, dictionary::fold_case, filter::HideCommands};
use steno_dict::{DictionaryPaths, StackConfig, load_stack, save};
use tracing::{info, warn};

/// 词典栈交互工具：加载若干词典，按优先级查询、反查与编辑。
#[derive(Parser, Debug)]
#[command(name = "steno_cli")]
struct Args {
    /// 词典路径，可重复；先出现的优先级更高
    #[arg(short, long = "dict", value_name = "PATH")]
    dicts: Vec<String>,

    /// 栈配置文件（TOML），与 --dict 同时给出时 --dict 排在前面
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 相对路径的基准目录，默认为平台配置目录下的 steno/
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// 输出 debug 日志
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let mut paths = DictionaryPaths::from_env();
    if let Some(dir) = args.config_dir {
        paths = paths.with_config_dir(dir);
    }

    let mut config = StackConfig::from_paths(args.dicts.iter().cloned());
    if let Some(file) = &args.config {
        config.dictionaries.extend(StackConfig::from_path(file)?.dictionaries);
    }
    let stack = DictionaryStack::with_dictionaries(load_stack(&config, &paths)?)?;
    info!(dictionaries = stack.len(), longest_key = stack.longest_key(), "词典栈就绪");

    repl(&stack, &paths)
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("steno_core=trace,steno_dict=debug,steno_cli=debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

const HELP: &str = "\
命令：
  lookup <outline>          带 filter 查询（例如 lookup TEFT/-G）
  raw <outline>             不带 filter 查询
  reverse <text>            反查 outline
  case <text>               大小写不敏感反查
  set <outline> <text>      写入第一个可写词典；set @<path> <outline> <text> 写入指定词典
  delete @<path> <outline>  从指定词典删除
  enable|disable <path>     启用/禁用词典
  hide|unhide               隐藏/显示命令类翻译
  list                      列出词典（优先级从高到低）
  longest                   最长 outline 的 stroke 数
  save <path>               写回词典文件
  :q                        退出";

struct Session<'a> {
    stack: &'a DictionaryStack,
    paths: &'a DictionaryPaths,
    hide_commands: Arc<dyn Filter>,
}

fn repl(stack: &DictionaryStack, paths: &DictionaryPaths) -> Result<(), Box<dyn Error>> {
    let mut out = io::stdout();
    let stdin = io::stdin();
    let mut line = String::new();
    let session = Session {
        stack,
        paths,
        hide_commands: Arc::new(HideCommands),
    };
    writeln!(out, "steno dictionary stack | {} 个词典 | 输入 help 查看命令", stack.len())?;

    loop {
        line.clear();
        write!(out, "steno> ")?;
        out.flush()?;
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == ":q" || input == ":quit" || input == ":exit" {
            break;
        }
        if let Err(err) = session.run(input, &mut out) {
            writeln!(out, "错误: {err}")?;
        }
    }
    Ok(())
}

impl Session<'_> {
    fn run(&self, input: &str, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
        let (command, rest) = input.split_once(' ').unwrap_or((input, ""));
        let rest = rest.trim();
        match command {
            "help" | "h" | "?" => writeln!(out, "{HELP}")?,
            "lookup" => {
                let outline: Outline = rest.parse()?;
                print_translation(out, self.stack.lookup(&outline))?;
            }
            "raw" => {
                let outline: Outline = rest.parse()?;
                print_translation(out, self.stack.raw_lookup(&outline))?;
            }
            "reverse" => {
                let mut outlines = self.stack.reverse_lookup(rest);
                outlines.sort();
                if outlines.is_empty() {
                    writeln!(out, "(无)")?;
                }
                for outline in outlines {
                    writeln!(out, "  {outline}")?;
                }
            }
            "case" => match self.stack.casereverse_lookup(&fold_case(rest)) {
                None => writeln!(out, "(没有启用的词典)")?,
                Some(cased) if cased.is_empty() => writeln!(out, "(无)")?,
                Some(cased) => {
                    for text in cased {
                        writeln!(out, "  {text}")?;
                    }
                }
            },
            "set" => {
                let (target, rest) = split_target(rest);
                let (outline, text) = rest.split_once(' ').ok_or("用法: set [@path] <outline> <text>")?;
                let outline: Outline = outline.parse()?;
                let target = target.map(|path| self.paths.expand(path));
                self.stack.set(outline, text.trim(), target.as_deref())?;
                writeln!(out, "ok")?;
            }
            "delete" => {
                let (Some(target), outline) = split_target(rest) else {
                    return Err("用法: delete @<path> <outline>".into());
                };
                let outline: Outline = outline.parse()?;
                let dictionary = self.stack.dictionary(&self.paths.expand(target))?;
                dictionary.delete(&outline)?;
                writeln!(out, "ok")?;
            }
            "enable" | "disable" => {
                let dictionary = self.stack.dictionary(&self.paths.expand(rest))?;
                dictionary.set_enabled(command == "enable");
                writeln!(out, "{}: {}", self.paths.shorten(dictionary.path()), dictionary.enabled())?;
            }
            "hide" => self.stack.add_filter(self.hide_commands.clone()),
            "unhide" => {
                self.stack.remove_filter(&self.hide_commands);
            }
            "list" => {
                for dictionary in self.stack.dictionaries() {
                    writeln!(
                        out,
                        "  {}\t{} 条\t{}{}",
                        self.paths.shorten(dictionary.path()),
                        dictionary.len(),
                        if dictionary.enabled() { "启用" } else { "禁用" },
                        if dictionary.readonly() { "\t只读" } else { "" },
                    )?;
                }
            }
            "longest" => writeln!(out, "{}", self.stack.longest_key())?,
            "save" => {
                let dictionary = self.stack.dictionary(&self.paths.expand(rest))?;
                save(&dictionary)?;
                writeln!(out, "ok")?;
            }
            _ => {
                warn!(command, "未知命令");
                writeln!(out, "未知命令，输入 help 查看")?;
            }
        }
        Ok(())
    }
}

/// `@path rest...` -> (Some(path), rest)
fn split_target(s: &str) -> (Option<&str>, &str) {
    match s.strip_prefix('@') {
        Some(rest) => {
            let (path, rest) = rest.split_once(' ').unwrap_or((rest, ""));
            (Some(path), rest.trim())
        }
        None => (None, s),
    }
}

fn print_translation(out: &mut impl Write, translation: Option<String>) -> io::Result<()> {
    match translation {
        Some(text) => writeln!(out, "  {text}"),
        None => writeln!(out, "(无翻译)"),
    }
}
