mod check;
mod helpers;
mod import;
mod ingredient;
mod migrate;
mod units;

pub(crate) use check::{cmd_check_amount, cmd_check_name, cmd_check_unit};
pub(crate) use import::{cmd_import_cook, cmd_import_csv};
pub(crate) use ingredient::{cmd_ingredient_list, cmd_ingredient_show, cmd_links};
pub(crate) use migrate::{cmd_migrate, cmd_runs};
pub(crate) use units::{ConvertTarget, cmd_categories, cmd_convert, cmd_units};
