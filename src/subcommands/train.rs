use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use rcconll::io::TrainInfo;
use rcconll::squad::{check_ids, create_squad_training, get_data_array, max_values};
use rcconll::{
    load_embedding_matrix, Device, EmbeddingFormat, Initialization, Mode, PointerModel,
    SquadFiles, TrainConfig, TrainDriver,
};

use crate::subcommands::RcConllApp;

static BATCH_SIZE: &str = "batch_size";
static DATA_PATH: &str = "data_path";
static EMBEDDINGS: &str = "embeddings";
static EMBEDDING_FORMAT: &str = "embedding_format";
static EPOCHS: &str = "epochs";
static GPU_ID: &str = "gpu_id";
static HIDDEN_SIZE: &str = "hidden_size";
static MAX_PARA: &str = "max_para_req";
static MODEL_DIR: &str = "model_dir";
static RESTORE: &str = "restore_training";
static SEED: &str = "seed";
static SELECT_DEVICE: &str = "select_device";
static TRAIN_SET_SIZE: &str = "train_set_size";

static DEFAULT_EMBEDDINGS: &str = "glove.trimmed.300.fifu";

/// Maximum length of the GPU identifier.
const MAX_GPU_ID_LEN: usize = 8;

/// Reading comprehension training subcommand.
pub struct TrainApp {
    data_path: PathBuf,
    model_dir: PathBuf,
    embeddings: PathBuf,
    embedding_format: EmbeddingFormat,
    gpu_id: String,
    device: Device,
    train_set_size: Option<usize>,
    restore: bool,
    config: TrainConfig,
}

impl TrainApp {
    /// Get the hyperparameters.
    pub fn config(&self) -> &TrainConfig {
        &self.config
    }
}

impl RcConllApp for TrainApp {
    fn app() -> App<'static, 'static> {
        Self::versioned_app("train")
            .about("Train a reading comprehension model")
            .arg(
                Arg::with_name(DATA_PATH)
                    .long("data_path")
                    .value_name("DIR")
                    .help("Directory with the preprocessed training data")
                    .takes_value(true)
                    .default_value("data")
                    .validator(existing_directory),
            )
            .arg(
                Arg::with_name(GPU_ID)
                    .long("gpu_id")
                    .value_name("ID")
                    .help("GPU id, exported as CUDA_VISIBLE_DEVICES")
                    .takes_value(true)
                    .default_value("0")
                    .validator(gpu_id_validator),
            )
            .arg(
                Arg::with_name(MAX_PARA)
                    .long("max_para_req")
                    .value_name("LEN")
                    .help("Maximum paragraph length (30-300)")
                    .takes_value(true)
                    .default_value("300")
                    .validator(range_validator(30, 300)),
            )
            .arg(
                Arg::with_name(EPOCHS)
                    .long("epochs")
                    .value_name("N")
                    .help("Number of epochs (1-30)")
                    .takes_value(true)
                    .default_value("15")
                    .validator(range_validator(1, 30)),
            )
            .arg(
                Arg::with_name(SELECT_DEVICE)
                    .long("select_device")
                    .value_name("DEVICE")
                    .help("Device to train on")
                    .takes_value(true)
                    .possible_values(&["CPU", "GPU"])
                    .case_insensitive(true)
                    .default_value("GPU"),
            )
            .arg(
                Arg::with_name(TRAIN_SET_SIZE)
                    .long("train_set_size")
                    .value_name("N")
                    .help("Number of training examples (default: all)")
                    .takes_value(true)
                    .validator(range_validator(1, usize::MAX)),
            )
            .arg(
                Arg::with_name(HIDDEN_SIZE)
                    .long("hidden_size")
                    .value_name("N")
                    .help("Number of hidden units (30-300)")
                    .takes_value(true)
                    .default_value("150")
                    .validator(range_validator(30, 300)),
            )
            .arg(
                Arg::with_name(MODEL_DIR)
                    .long("model_dir")
                    .value_name("DIR")
                    .help("Directory to save the model in")
                    .takes_value(true)
                    .default_value("trained_model")
                    .validator(parent_exists),
            )
            .arg(
                Arg::with_name(RESTORE)
                    .long("restore_training")
                    .help("Restore training from a previously saved model"),
            )
            .arg(
                Arg::with_name(BATCH_SIZE)
                    .long("batch_size")
                    .value_name("N")
                    .help("Batch size (1-256)")
                    .takes_value(true)
                    .default_value("64")
                    .validator(range_validator(1, 256)),
            )
            .arg(
                Arg::with_name(EMBEDDINGS)
                    .long("embeddings")
                    .value_name("FILE")
                    .help("Word embeddings (default: DIR/glove.trimmed.300.fifu)")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name(EMBEDDING_FORMAT)
                    .long("embedding_format")
                    .value_name("FORMAT")
                    .help("Embedding format (default: guessed from the file extension)")
                    .takes_value(true)
                    .possible_values(&["finalfusion", "text", "textdims", "word2vec"]),
            )
            .arg(
                Arg::with_name(SEED)
                    .long("seed")
                    .value_name("SEED")
                    .help("Random number generator seed (default: random)")
                    .takes_value(true)
                    .validator(seed_validator),
            )
    }

    fn parse(matches: &ArgMatches) -> Result<Self> {
        let data_path = PathBuf::from(matches.value_of(DATA_PATH).unwrap());
        let model_dir = PathBuf::from(matches.value_of(MODEL_DIR).unwrap());
        let embeddings = matches
            .value_of(EMBEDDINGS)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_path.join(DEFAULT_EMBEDDINGS));
        let embedding_format = match matches.value_of(EMBEDDING_FORMAT) {
            Some(format) => EmbeddingFormat::try_from_str(format)?,
            None => EmbeddingFormat::from_path(&embeddings),
        };

        let device = Device::try_from_str(matches.value_of(SELECT_DEVICE).unwrap())?;
        let train_set_size = matches
            .value_of(TRAIN_SET_SIZE)
            .map(|v| v.parse().context("Cannot parse training set size"))
            .transpose()?;
        let seed = match matches.value_of(SEED) {
            Some(seed) => seed.parse().context("Cannot parse seed")?,
            None => rand::random(),
        };

        let config = TrainConfig {
            batch_size: matches
                .value_of(BATCH_SIZE)
                .unwrap()
                .parse()
                .context("Cannot parse batch size")?,
            hidden_size: matches
                .value_of(HIDDEN_SIZE)
                .unwrap()
                .parse()
                .context("Cannot parse number of hidden units")?,
            max_para: matches
                .value_of(MAX_PARA)
                .unwrap()
                .parse()
                .context("Cannot parse maximum paragraph length")?,
            epochs: matches
                .value_of(EPOCHS)
                .unwrap()
                .parse()
                .context("Cannot parse number of epochs")?,
            seed,
            ..TrainConfig::default()
        };

        Ok(TrainApp {
            data_path,
            model_dir,
            embeddings,
            embedding_format,
            gpu_id: matches.value_of(GPU_ID).unwrap().to_owned(),
            device,
            train_set_size,
            restore: matches.is_present(RESTORE),
            config,
        })
    }

    fn run(&self) -> Result<()> {
        env::set_var("CUDA_VISIBLE_DEVICES", &self.gpu_id);
        if self.device == Device::Gpu {
            eprintln!("No GPU support, training on the CPU");
        }

        let mut config = self.config;
        let files = SquadFiles::new(&self.data_path);

        let mut data_train =
            create_squad_training(&files.train_para_ids, &files.train_ques_ids, &files.train_answer)?;
        let data_dev =
            create_squad_training(&files.val_para_ids, &files.val_ques_ids, &files.val_answer)?;

        if let Some(size) = self.train_set_size {
            data_train.truncate(size);
        }
        config.train_set_size = data_train.len();

        let (_, max_question) = max_values(data_train.iter().chain(&data_dev));
        config.max_question = max_question;

        eprintln!("Loading Embeddings");
        let (embeds, n_unknown) =
            load_embedding_matrix(&files.vocab, &self.embeddings, self.embedding_format)?;
        eprintln!(
            "{} of {} vocabulary types have no embedding",
            n_unknown,
            embeds.nrows()
        );
        check_ids(data_train.iter().chain(&data_dev), embeds.nrows())?;

        eprintln!("Creating training and development sets");
        let mut train = get_data_array(&config, data_train, Mode::Train);
        let dev = get_data_array(&config, data_dev, Mode::Validation);
        eprintln!(
            "{} training examples, {} validation examples",
            train.len(),
            dev.len()
        );

        let seed = u64::from(config.seed);
        let model = PointerModel::new(config, embeds, XorShiftRng::seed_from_u64(seed));
        let mut driver = TrainDriver::new(
            model,
            config,
            TrainInfo::new(&self.data_path, &self.model_dir),
            XorShiftRng::seed_from_u64(seed.wrapping_add(1)),
        )?;

        if driver.initialize(self.restore)? == Initialization::Fresh {
            eprintln!("Initialized with random weights");
        }

        driver.run(&mut train, &dev)?;

        Ok(())
    }
}

fn range_validator(min: usize, max: usize) -> impl Fn(String) -> Result<(), String> {
    move |v| match v.parse::<usize>() {
        Ok(n) if n >= min && n <= max => Ok(()),
        Ok(n) => Err(format!("{} is not in the range {}-{}", n, min, max)),
        Err(_) => Err(format!("{} is not a non-negative integer", v)),
    }
}

fn gpu_id_validator(v: String) -> Result<(), String> {
    if v.len() <= MAX_GPU_ID_LEN {
        Ok(())
    } else {
        Err(format!(
            "GPU id '{}' is longer than {} characters",
            v, MAX_GPU_ID_LEN
        ))
    }
}

fn seed_validator(v: String) -> Result<(), String> {
    v.parse::<u32>()
        .map(|_| ())
        .map_err(|_| format!("{} is not a valid seed", v))
}

fn existing_directory(v: String) -> Result<(), String> {
    if Path::new(&v).is_dir() {
        Ok(())
    } else {
        Err(format!("{} is not an existing directory", v))
    }
}

fn parent_exists(v: String) -> Result<(), String> {
    let parent = match Path::new(&v).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };

    if parent.is_dir() {
        Ok(())
    } else {
        Err(format!("The parent directory of {} does not exist", v))
    }
}
