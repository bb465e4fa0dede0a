//! Terminal form that collects one transaction from the operator.
//!
//! Each field shows its allowed values and default. An empty answer keeps the
//! default, an invalid one is explained and asked again. End of input ends the
//! session without a submission.

use crate::error::InputError;
use crate::types::transaction::{
    validate_amount, validate_days_since_use, validate_issuer_code, Browser, CardType, Choice,
    DeviceType, EmailMatch, RawInput, MAX_DAYS_SINCE_USE,
};
use anyhow::Result;
use std::io::{BufRead, Write};

pub const TITLE: &str = "💳 Smart Fraud Detector";
pub const INTRO: &str = "Enter the transaction details below to get a fraud probability prediction.";

/// Line-oriented form over any reader/writer pair.
pub struct TerminalForm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalForm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print the page header.
    pub fn header(&mut self) -> Result<()> {
        writeln!(self.output, "{TITLE}")?;
        writeln!(self.output, "{INTRO}")?;
        writeln!(self.output)?;
        writeln!(self.output, "Transaction Details")?;
        Ok(())
    }

    /// Collect every field. `None` when input ends before the form is complete.
    pub fn collect(&mut self) -> Result<Option<RawInput>> {
        let defaults = RawInput::default();

        let Some(amount) = self.ask(
            "Transaction Amount ($)",
            &format!("{:.2}", defaults.amount),
            parse_amount,
        )?
        else {
            return Ok(None);
        };
        let Some(card_type) = self.ask_choice::<CardType>()? else {
            return Ok(None);
        };
        let Some(issuer_code) = self.ask(
            "Card Issuer Code (e.g., first few digits, if available)",
            &defaults.issuer_code.to_string(),
            parse_issuer_code,
        )?
        else {
            return Ok(None);
        };
        let Some(device_type) = self.ask_choice::<DeviceType>()? else {
            return Ok(None);
        };
        let Some(browser) = self.ask_choice::<Browser>()? else {
            return Ok(None);
        };
        let Some(days_since_use) = self.ask(
            &format!("Days Since Last Use (0-{MAX_DAYS_SINCE_USE})"),
            &defaults.days_since_use.to_string(),
            parse_days_since_use,
        )?
        else {
            return Ok(None);
        };
        let Some(email_match) = self.ask_choice::<EmailMatch>()? else {
            return Ok(None);
        };

        Ok(Some(RawInput {
            amount,
            card_type,
            issuer_code,
            device_type,
            browser,
            days_since_use,
            email_match,
        }))
    }

    /// Yes/no question; empty or end of input answers no.
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        write!(self.output, "{question} [y/N]: ")?;
        self.output.flush()?;
        Ok(self
            .read_answer()?
            .map(|a| matches!(a.to_ascii_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false))
    }

    /// Write rendered output lines.
    pub fn show(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{text}")?;
        self.output.flush()?;
        Ok(())
    }

    fn ask_choice<C: Choice>(&mut self) -> Result<Option<C>> {
        let options: Vec<String> = C::ALL
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}) {}", i + 1, c.label()))
            .collect();
        let prompt = format!("{} [{}]", C::PROMPT, options.join(", "));
        self.ask(&prompt, C::default_choice().label(), |answer| {
            C::parse_choice(answer).ok_or_else(|| {
                InputError::new(C::PROMPT, format!("'{answer}' is not one of the options"))
            })
        })
    }

    fn ask<T>(
        &mut self,
        prompt: &str,
        default: &str,
        parse: impl Fn(&str) -> Result<T, InputError>,
    ) -> Result<Option<T>> {
        loop {
            write!(self.output, "{prompt} (default: {default}): ")?;
            self.output.flush()?;

            let Some(answer) = self.read_answer()? else {
                return Ok(None);
            };
            let answer = if answer.is_empty() {
                default.to_string()
            } else {
                answer
            };

            match parse(&answer) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => writeln!(self.output, "  Invalid value, {e}")?,
            }
        }
    }

    /// Next trimmed line, or `None` at end of input.
    fn read_answer(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }
}

fn parse_amount(answer: &str) -> Result<f64, InputError> {
    let amount: f64 = answer
        .trim_start_matches('$')
        .replace(',', "")
        .parse()
        .map_err(|_| InputError::new("amount", format!("'{answer}' is not a number")))?;
    validate_amount(amount)?;
    Ok(amount)
}

fn parse_issuer_code(answer: &str) -> Result<u32, InputError> {
    let code: u32 = answer
        .parse()
        .map_err(|_| InputError::new("issuer code", format!("'{answer}' is not a whole number")))?;
    validate_issuer_code(code)?;
    Ok(code)
}

fn parse_days_since_use(answer: &str) -> Result<u16, InputError> {
    let days: u16 = answer.parse().map_err(|_| {
        InputError::new(
            "days since use",
            format!("must be between 0 and {MAX_DAYS_SINCE_USE}"),
        )
    })?;
    validate_days_since_use(days)?;
    Ok(days)
}
