use std::io::{self, BufRead, Write};

/// Lists `choices` and reads a 1-based pick from `input`. An empty answer
/// takes `default`.
pub fn choose<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    message: &str,
    choices: &[&str],
    default: Option<usize>,
) -> io::Result<usize> {
    if choices.is_empty() {
        return Err(io::Error::other(format!("{message}: nothing to choose from")));
    }

    writeln!(output, "{message}")?;
    for (i, choice) in choices.iter().enumerate() {
        let mark = if Some(i) == default { '*' } else { ' ' };
        writeln!(output, "{mark}{:>3}) {choice}", i + 1)?;
    }

    let mut line = String::with_capacity(16);
    loop {
        output.write_all(b"> ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        let answer = line.trim();

        if answer.is_empty() {
            if let Some(default) = default {
                return Ok(default);
            }
        } else if let Ok(n) = answer.parse::<usize>()
            && (1..=choices.len()).contains(&n)
        {
            return Ok(n - 1);
        } else if let Some(i) = choices.iter().position(|c| c.eq_ignore_ascii_case(answer)) {
            return Ok(i);
        }
        writeln!(output, "please enter a number between 1 and {}", choices.len())?;
    }
}

/// [`choose`] on the terminal.
pub fn choose_stdin(message: &str, choices: &[&str], default: Option<usize>) -> io::Result<usize> {
    choose(&mut io::stdin().lock(), &mut io::stdout(), message, choices, default)
}
