use std::io::Read;

use csv::{DeserializeRecordsIntoIter, Trim};
use rust_decimal::Decimal;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{account::AccountId, command::TransferRequest};

#[derive(Debug, Deserialize)]
pub struct OpeningAccount {
    pub id: AccountId,
    pub owner: String,
    pub balance: Decimal,
}

/// Parses rows of a CSV file, yielding the line each row started at.
///
/// Malformed rows are yielded as errors, it's up to the caller to decide what to do.
pub struct CsvParser<R, T> {
    iter: DeserializeRecordsIntoIter<R, T>,
}

pub type CsvAccountParser<R> = CsvParser<R, OpeningAccount>;
pub type CsvTransferParser<R> = CsvParser<R, TransferRequest>;

impl<R, T> CsvParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        Self {
            iter: reader.into_deserialize(),
        }
    }
}

impl<R, T> Iterator for CsvParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    type Item = (u64, csv::Result<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let curr_line = self.iter.reader().position().line();
        self.iter.next().map(|row| (curr_line, row))
    }
}
